//! Result-set driver.
//!
//! A [`Recordset`] owns a built plan and its execution context. It drives
//! the plan to completion, closes it on every exit path, and maintains the
//! session's `FOUND_ROWS` counter when a result set is fully consumed.

use quarry_codec::Datum;
use quarry_common::error::QuarryResult;

use crate::field::ResultField;
use crate::plan::{ExecutionContext, Plan, Row};

/// A cursor over the rows a plan produces.
pub struct Recordset {
    ctx: ExecutionContext,
    plan: Plan,
}

impl Recordset {
    /// Creates a recordset over a built plan.
    #[must_use]
    pub fn new(ctx: ExecutionContext, plan: Plan) -> Self {
        Self { ctx, plan }
    }

    /// Returns the visible output schema.
    #[must_use]
    pub fn fields(&self) -> &[ResultField] {
        self.plan.fields()
    }

    /// Pulls the next row.
    pub fn next(&mut self) -> QuarryResult<Option<Row>> {
        self.plan.next(&self.ctx)
    }

    /// Releases the plan tree. Idempotent.
    pub fn close(&mut self) {
        self.plan.close();
    }

    /// Applies `f` to every row. The plan is closed on success, error and
    /// early stop alike; a fully consumed result set updates `FOUND_ROWS`.
    pub fn for_each<F>(&mut self, mut f: F) -> QuarryResult<()>
    where
        F: FnMut(&Row) -> QuarryResult<bool>,
    {
        let mut found: u64 = 0;
        let result = loop {
            match self.plan.next(&self.ctx) {
                Ok(Some(row)) => {
                    found += 1;
                    match f(&row) {
                        Ok(true) => {}
                        Ok(false) => break Ok(false),
                        Err(err) => break Err(err),
                    }
                }
                Ok(None) => break Ok(true),
                Err(err) => break Err(err),
            }
        };
        self.plan.close();
        match result {
            Ok(consumed_all) => {
                if consumed_all {
                    self.ctx.session.lock().found_rows = found;
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Collects every row's data, closing the plan on all exit paths.
    pub fn collect(&mut self) -> QuarryResult<Vec<Vec<Datum>>> {
        let mut rows = Vec::new();
        self.for_each(|row| {
            rows.push(row.data.clone());
            Ok(true)
        })?;
        Ok(rows)
    }
}
