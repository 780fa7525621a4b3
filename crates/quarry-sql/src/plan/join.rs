//! Nested-loop join.
//!
//! The inner side is closed and re-pulled from the start for every outer
//! row. LEFT buffers the matching inner rows per outer row and NULL-pads
//! the right side when none match; RIGHT is the mirror image with the outer
//! loop over the right input. FULL is rejected at plan time and never
//! reaches execution.

use quarry_codec::Datum;
use quarry_common::error::{QuarryError, QuarryResult};

use crate::expr::{eval_bool, AggPhase, EvalContext, Expr};
use crate::field::ResultField;
use crate::stmt::JoinType;

use super::{ExecutionContext, Plan, Row};

/// The nested-loop join operator.
#[derive(Debug)]
pub struct JoinPlan {
    left: Box<Plan>,
    right: Box<Plan>,
    join_type: JoinType,
    on: Option<Expr>,
    fields: Vec<ResultField>,
    left_width: usize,
    right_width: usize,
    cur_row: Option<Row>,
    matched: Vec<Row>,
    cursor: usize,
}

impl JoinPlan {
    /// Creates a join; fields are the concatenation of the children's.
    #[must_use]
    pub fn new(left: Box<Plan>, right: Box<Plan>, join_type: JoinType, on: Option<Expr>) -> Self {
        let mut fields = left.fields().to_vec();
        fields.extend_from_slice(right.fields());
        let left_width = left.fields().len();
        let right_width = right.fields().len();
        Self {
            left,
            right,
            join_type,
            on,
            fields,
            left_width,
            right_width,
            cur_row: None,
            matched: Vec::new(),
            cursor: 0,
        }
    }

    pub(crate) fn fields(&self) -> &[ResultField] {
        &self.fields
    }

    pub(crate) fn left(&self) -> &Plan {
        &self.left
    }

    pub(crate) fn right(&self) -> &Plan {
        &self.right
    }

    pub(crate) fn join_type(&self) -> JoinType {
        self.join_type
    }

    pub(crate) fn next(&mut self, ctx: &ExecutionContext) -> QuarryResult<Option<Row>> {
        match self.join_type {
            JoinType::Cross => self.next_cross(ctx),
            JoinType::Left => self.next_outer(ctx, false),
            JoinType::Right => self.next_outer(ctx, true),
            JoinType::Full => Err(QuarryError::UnsupportedJoinType {
                join_type: JoinType::Full.to_string(),
            }),
        }
    }

    pub(crate) fn close(&mut self) {
        self.cur_row = None;
        self.matched.clear();
        self.cursor = 0;
        self.left.close();
        self.right.close();
    }

    /// Offers the predicate to either child, left first.
    pub(crate) fn try_filter(
        mut self,
        ctx: &ExecutionContext,
        expr: &Expr,
    ) -> QuarryResult<(Plan, bool)> {
        let (left, consumed) = (*self.left).filter(ctx, expr)?;
        self.left = Box::new(left);
        if consumed {
            return Ok((Plan::Join(self), true));
        }
        let (right, consumed) = (*self.right).filter(ctx, expr)?;
        self.right = Box::new(right);
        Ok((Plan::Join(self), consumed))
    }

    fn on_matches(
        on: &Option<Expr>,
        fields: &[ResultField],
        data: &[Datum],
        ctx: &ExecutionContext,
    ) -> QuarryResult<bool> {
        let Some(on) = on else {
            return Ok(true);
        };
        let session = ctx.session.lock();
        let eval_ctx = EvalContext {
            session: Some(&session),
            fields,
            data,
            aggs: None,
            phase: AggPhase::Finalize,
        };
        eval_bool(on, &eval_ctx)
    }

    fn next_cross(&mut self, ctx: &ExecutionContext) -> QuarryResult<Option<Row>> {
        loop {
            if self.cur_row.is_none() {
                self.cur_row = self.left.next(ctx)?;
                if self.cur_row.is_none() {
                    return Ok(None);
                }
            }
            let Some(right_row) = self.right.next(ctx)? else {
                self.cur_row = None;
                self.right.close();
                continue;
            };
            let Some(left_row) = self.cur_row.as_ref() else {
                return Ok(None);
            };

            let mut data = left_row.data.clone();
            data.extend(right_row.data);
            if !Self::on_matches(&self.on, &self.fields, &data, ctx)? {
                continue;
            }
            let mut row_keys = left_row.row_keys.clone();
            row_keys.extend(right_row.row_keys);
            return Ok(Some(Row { data, row_keys }));
        }
    }

    fn next_outer(&mut self, ctx: &ExecutionContext, outer_is_right: bool) -> QuarryResult<Option<Row>> {
        loop {
            if self.cursor < self.matched.len() {
                let row = self.matched[self.cursor].clone();
                self.cursor += 1;
                return Ok(Some(row));
            }
            let outer = if outer_is_right {
                self.right.next(ctx)?
            } else {
                self.left.next(ctx)?
            };
            let Some(outer) = outer else {
                return Ok(None);
            };
            self.find_matched(ctx, outer, outer_is_right)?;
        }
    }

    /// Re-runs the inner side for one outer row, buffering every joined row
    /// satisfying ON; pads with NULLs when nothing matched.
    fn find_matched(
        &mut self,
        ctx: &ExecutionContext,
        outer: Row,
        outer_is_right: bool,
    ) -> QuarryResult<()> {
        self.cursor = 0;
        self.matched.clear();

        let fields = &self.fields;
        let on = &self.on;
        let inner = if outer_is_right {
            &mut self.left
        } else {
            &mut self.right
        };
        inner.close();

        while let Some(inner_row) = inner.next(ctx)? {
            let mut data;
            if outer_is_right {
                data = inner_row.data;
                data.extend(outer.data.iter().cloned());
            } else {
                data = outer.data.clone();
                data.extend(inner_row.data);
            }
            if !Self::on_matches(on, fields, &data, ctx)? {
                continue;
            }
            let mut row_keys = outer.row_keys.clone();
            row_keys.extend(inner_row.row_keys);
            self.matched.push(Row { data, row_keys });
        }

        if self.matched.is_empty() {
            let data = if outer_is_right {
                let mut data = vec![Datum::Null; self.left_width];
                data.extend(outer.data);
                data
            } else {
                let mut data = outer.data;
                data.extend(vec![Datum::Null; self.right_width]);
                data
            };
            self.matched.push(Row {
                data,
                row_keys: outer.row_keys,
            });
        }
        Ok(())
    }
}
