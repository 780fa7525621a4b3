//! Origin row-key capture.

use quarry_common::error::QuarryResult;

use crate::expr::Expr;
use crate::field::ResultField;

use super::{ExecutionContext, Plan, Row};

/// Transparent operator inserted immediately above the FROM source. It
/// snapshots each row's origin row keys before later operators reassemble
/// row data, so locking still sees where every row came from.
#[derive(Debug)]
pub struct RowStackFromPlan {
    src: Box<Plan>,
}

impl RowStackFromPlan {
    /// Creates the operator.
    #[must_use]
    pub fn new(src: Box<Plan>) -> Self {
        Self { src }
    }

    pub(crate) fn fields(&self) -> &[ResultField] {
        self.src.fields()
    }

    pub(crate) fn src(&self) -> &Plan {
        &self.src
    }

    pub(crate) fn next(&mut self, ctx: &ExecutionContext) -> QuarryResult<Option<Row>> {
        let Some(row) = self.src.next(ctx)? else {
            return Ok(None);
        };
        let row_keys = row.row_keys.clone();
        Ok(Some(Row {
            data: row.data,
            row_keys,
        }))
    }

    pub(crate) fn close(&mut self) {
        self.src.close();
    }

    /// Forwards predicate pushdown to the source.
    pub(crate) fn try_filter(
        mut self,
        ctx: &ExecutionContext,
        expr: &Expr,
    ) -> QuarryResult<(Plan, bool)> {
        let (src, consumed) = (*self.src).filter(ctx, expr)?;
        self.src = Box::new(src);
        Ok((Plan::RowStackFrom(self), consumed))
    }
}
