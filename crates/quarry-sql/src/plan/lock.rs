//! Row locks for `SELECT ... FOR UPDATE`.

use quarry_common::error::QuarryResult;

use crate::field::ResultField;
use crate::stmt::SelectLock;

use super::{ExecutionContext, Plan, Row};

/// Acquires row locks on each emitted row's origin row keys. The planner
/// degrades the lock mode to none under auto-commit (MySQL semantics), which
/// makes this a pass-through.
#[derive(Debug)]
pub struct LockPlan {
    src: Box<Plan>,
    lock: SelectLock,
}

impl LockPlan {
    /// Creates the operator.
    #[must_use]
    pub fn new(src: Box<Plan>, lock: SelectLock) -> Self {
        Self { src, lock }
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
        if self.lock == SelectLock::ForUpdate && !row.row_keys.is_empty() {
            let mut txn = ctx.txn.lock();
            txn.lock_keys(row.row_keys.iter().map(|entry| entry.key.clone()))?;
        }
        Ok(Some(row))
    }

    pub(crate) fn close(&mut self) {
        self.src.close();
    }
}
