//! ORDER BY.

use std::cmp::Ordering;

use quarry_codec::Datum;
use quarry_common::error::QuarryResult;

use crate::expr::{eval, AggPhase, EvalContext};
use crate::field::ResultField;
use crate::stmt::OrderByItem;

use super::{ExecutionContext, Plan, Row};

/// Buffers the source and sorts by the ordered `(expression, direction)`
/// list. Sort keys are evaluated once per row before sorting; the sort is
/// stable, so ties keep their arrival order. NULL sorts below any value.
#[derive(Debug)]
pub struct OrderByPlan {
    src: Box<Plan>,
    by: Vec<OrderByItem>,
    sorted: Option<Vec<Row>>,
    cursor: usize,
}

impl OrderByPlan {
    /// Creates the operator.
    #[must_use]
    pub fn new(src: Box<Plan>, by: Vec<OrderByItem>) -> Self {
        Self {
            src,
            by,
            sorted: None,
            cursor: 0,
        }
    }

    pub(crate) fn fields(&self) -> &[ResultField] {
        self.src.fields()
    }

    pub(crate) fn src(&self) -> &Plan {
        &self.src
    }

    pub(crate) fn by_len(&self) -> usize {
        self.by.len()
    }

    pub(crate) fn next(&mut self, ctx: &ExecutionContext) -> QuarryResult<Option<Row>> {
        if self.sorted.is_none() {
            self.sort(ctx)?;
        }
        let Some(rows) = self.sorted.as_ref() else {
            return Ok(None);
        };
        if self.cursor >= rows.len() {
            return Ok(None);
        }
        let row = rows[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(row))
    }

    pub(crate) fn close(&mut self) {
        self.sorted = None;
        self.cursor = 0;
        self.src.close();
    }

    fn sort(&mut self, ctx: &ExecutionContext) -> QuarryResult<()> {
        let mut keyed: Vec<(Vec<Datum>, Row)> = Vec::new();
        while let Some(row) = self.src.next(ctx)? {
            let keys = {
                let session = ctx.session.lock();
                let eval_ctx = EvalContext {
                    session: Some(&session),
                    fields: self.src.fields(),
                    data: &row.data,
                    aggs: None,
                    phase: AggPhase::Finalize,
                };
                self.by
                    .iter()
                    .map(|item| eval(&item.expr, &eval_ctx))
                    .collect::<QuarryResult<Vec<Datum>>>()?
            };
            keyed.push((keys, row));
        }

        let directions: Vec<bool> = self.by.iter().map(|item| item.asc).collect();
        keyed.sort_by(|(a, _), (b, _)| {
            for (idx, asc) in directions.iter().enumerate() {
                let ordering = a[idx].cmp_order(&b[idx]);
                let ordering = if *asc { ordering } else { ordering.reverse() };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        self.sorted = Some(keyed.into_iter().map(|(_, row)| row).collect());
        Ok(())
    }
}
