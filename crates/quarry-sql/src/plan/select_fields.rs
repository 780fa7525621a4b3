//! Projection without aggregation.

use quarry_codec::Datum;
use quarry_common::error::QuarryResult;

use crate::expr::{eval, AggPhase, EvalContext};
use crate::field::ResultField;

use super::select_list::SelectList;
use super::{ExecutionContext, Plan, Row};

/// Evaluates every projection (hidden fields included) against each source
/// row. Without a source, emits exactly one row evaluated against nothing
/// (the `SELECT 1` / `SELECT DATABASE()` shape).
#[derive(Debug)]
pub struct SelectFieldsPlan {
    src: Option<Box<Plan>>,
    select_list: SelectList,
    done: bool,
}

impl SelectFieldsPlan {
    /// Creates the projection operator.
    #[must_use]
    pub fn new(src: Option<Box<Plan>>, select_list: SelectList) -> Self {
        Self {
            src,
            select_list,
            done: false,
        }
    }

    pub(crate) fn fields(&self) -> &[ResultField] {
        &self.select_list.result_fields
    }

    pub(crate) fn src(&self) -> Option<&Plan> {
        self.src.as_deref()
    }

    pub(crate) fn next(&mut self, ctx: &ExecutionContext) -> QuarryResult<Option<Row>> {
        match &mut self.src {
            Some(src) => {
                let Some(row) = src.next(ctx)? else {
                    return Ok(None);
                };
                let data = {
                    let session = ctx.session.lock();
                    let eval_ctx = EvalContext {
                        session: Some(&session),
                        fields: src.fields(),
                        data: &row.data,
                        aggs: None,
                        phase: AggPhase::Finalize,
                    };
                    self.select_list
                        .fields
                        .iter()
                        .map(|field| eval(&field.expr, &eval_ctx))
                        .collect::<QuarryResult<Vec<Datum>>>()?
                };
                Ok(Some(Row {
                    data,
                    row_keys: row.row_keys,
                }))
            }
            None => {
                if self.done {
                    return Ok(None);
                }
                self.done = true;
                let data = {
                    let session = ctx.session.lock();
                    let eval_ctx = EvalContext {
                        session: Some(&session),
                        fields: &[],
                        data: &[],
                        aggs: None,
                        phase: AggPhase::Finalize,
                    };
                    self.select_list
                        .fields
                        .iter()
                        .map(|field| eval(&field.expr, &eval_ctx))
                        .collect::<QuarryResult<Vec<Datum>>>()?
                };
                Ok(Some(Row::new(data)))
            }
        }
    }

    pub(crate) fn close(&mut self) {
        if let Some(src) = &mut self.src {
            src.close();
        }
        self.done = false;
    }
}
