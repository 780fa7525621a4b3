//! Grouping and aggregation.
//!
//! The operator materializes its source, partitions rows by the evaluated
//! group-by key tuple (the codec encoding of the key datums, so tuple
//! equality is byte equality), then emits one row per group in arrival
//! order. Aggregate projections run in two phases over each group's rows;
//! non-aggregate projections evaluate over the group's first row. An empty
//! input with aggregation but no group-by yields one row of aggregates over
//! the empty set.

use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

use quarry_codec::{encode_value, Datum};
use quarry_common::error::QuarryResult;

use crate::expr::{eval, AggPhase, AggState, EvalContext, Expr};
use crate::field::ResultField;

use super::select_list::SelectList;
use super::{ExecutionContext, Plan, Row};

/// The group-by / aggregation operator.
#[derive(Debug)]
pub struct GroupByPlan {
    src: Box<Plan>,
    by: Vec<Expr>,
    select_list: SelectList,
    /// Offsets of aggregate projections, ascending; the evaluation walk
    /// order both phases share.
    agg_offsets: Vec<usize>,
    emitted: Option<VecDeque<Row>>,
}

impl GroupByPlan {
    /// Creates the operator.
    #[must_use]
    pub fn new(src: Box<Plan>, by: Vec<Expr>, select_list: SelectList) -> Self {
        let mut agg_offsets: Vec<usize> = select_list.agg_fields.iter().copied().collect();
        agg_offsets.sort_unstable();
        Self {
            src,
            by,
            select_list,
            agg_offsets,
            emitted: None,
        }
    }

    pub(crate) fn fields(&self) -> &[ResultField] {
        &self.select_list.result_fields
    }

    pub(crate) fn src(&self) -> &Plan {
        &self.src
    }

    pub(crate) fn group_by_len(&self) -> usize {
        self.by.len()
    }

    pub(crate) fn next(&mut self, ctx: &ExecutionContext) -> QuarryResult<Option<Row>> {
        if self.emitted.is_none() {
            self.materialize(ctx)?;
        }
        Ok(self.emitted.as_mut().and_then(VecDeque::pop_front))
    }

    pub(crate) fn close(&mut self) {
        self.emitted = None;
        self.src.close();
    }

    fn materialize(&mut self, ctx: &ExecutionContext) -> QuarryResult<()> {
        let mut order: Vec<Vec<u8>> = Vec::new();
        let mut groups: HashMap<Vec<u8>, Vec<Row>> = HashMap::new();

        while let Some(row) = self.src.next(ctx)? {
            let key = {
                let session = ctx.session.lock();
                let eval_ctx = EvalContext {
                    session: Some(&session),
                    fields: self.src.fields(),
                    data: &row.data,
                    aggs: None,
                    phase: AggPhase::Finalize,
                };
                let key_datums = self
                    .by
                    .iter()
                    .map(|expr| eval(expr, &eval_ctx))
                    .collect::<QuarryResult<Vec<Datum>>>()?;
                encode_value(&key_datums)
            };
            match groups.entry(key) {
                Entry::Occupied(mut entry) => entry.get_mut().push(row),
                Entry::Vacant(entry) => {
                    order.push(entry.key().clone());
                    entry.insert(vec![row]);
                }
            }
        }

        let mut emitted = VecDeque::with_capacity(order.len().max(1));
        if groups.is_empty() && self.by.is_empty() {
            // Aggregates over the empty set still produce one row.
            emitted.push_back(self.emit_group(ctx, &[])?);
        } else {
            for key in &order {
                let rows = groups.get(key).map_or(&[][..], Vec::as_slice);
                emitted.push_back(self.emit_group(ctx, rows)?);
            }
        }
        self.emitted = Some(emitted);
        Ok(())
    }

    fn emit_group(&self, ctx: &ExecutionContext, rows: &[Row]) -> QuarryResult<Row> {
        let session = ctx.session.lock();
        let src_fields = self.src.fields();
        let state = RefCell::new(AggState::default());

        // Phase one: feed every aggregate projection each group row.
        for row in rows {
            state.borrow_mut().reset_cursor();
            for &offset in &self.agg_offsets {
                let eval_ctx = EvalContext {
                    session: Some(&session),
                    fields: src_fields,
                    data: &row.data,
                    aggs: Some(&state),
                    phase: AggPhase::Accumulate,
                };
                eval(&self.select_list.fields[offset].expr, &eval_ctx)?;
            }
        }

        // Phase two: evaluate every projection; aggregate nodes read their
        // results back, everything else sees the group's first row.
        let empty_row: Vec<Datum> = vec![Datum::Null; src_fields.len()];
        let first_data = rows.first().map_or(empty_row.as_slice(), |r| r.data.as_slice());
        state.borrow_mut().reset_cursor();
        let mut data = Vec::with_capacity(self.select_list.fields.len());
        for field in &self.select_list.fields {
            let eval_ctx = EvalContext {
                session: Some(&session),
                fields: src_fields,
                data: first_data,
                aggs: Some(&state),
                phase: AggPhase::Finalize,
            };
            data.push(eval(&field.expr, &eval_ctx)?);
        }

        let row_keys = rows.first().map(|r| r.row_keys.clone()).unwrap_or_default();
        Ok(Row { data, row_keys })
    }
}
