//! WHERE and HAVING filters.
//!
//! Both yield the source rows whose predicate evaluates truthy; HAVING is
//! structurally identical but sits after group-by, where its identifiers
//! and hoisted positions bind against the extended select list the source
//! emits.

use quarry_common::error::QuarryResult;

use crate::expr::{eval_bool, EvalContext, Expr};
use crate::field::ResultField;

use super::{ExecutionContext, Plan, Row};

fn filter_next(
    src: &mut Plan,
    expr: &Expr,
    ctx: &ExecutionContext,
) -> QuarryResult<Option<Row>> {
    loop {
        let Some(row) = src.next(ctx)? else {
            return Ok(None);
        };
        let truthy = {
            let session = ctx.session.lock();
            let eval_ctx = EvalContext {
                session: Some(&session),
                fields: src.fields(),
                data: &row.data,
                aggs: None,
                phase: crate::expr::AggPhase::Finalize,
            };
            eval_bool(expr, &eval_ctx)?
        };
        if truthy {
            return Ok(Some(row));
        }
    }
}

/// The WHERE operator.
#[derive(Debug)]
pub struct FilterPlan {
    src: Box<Plan>,
    expr: Expr,
}

impl FilterPlan {
    /// Creates a filter over `src`.
    #[must_use]
    pub fn new(src: Box<Plan>, expr: Expr) -> Self {
        Self { src, expr }
    }

    pub(crate) fn fields(&self) -> &[ResultField] {
        self.src.fields()
    }

    pub(crate) fn src(&self) -> &Plan {
        &self.src
    }

    pub(crate) fn expr(&self) -> &Expr {
        &self.expr
    }

    pub(crate) fn next(&mut self, ctx: &ExecutionContext) -> QuarryResult<Option<Row>> {
        filter_next(&mut self.src, &self.expr, ctx)
    }

    pub(crate) fn close(&mut self) {
        self.src.close();
    }
}

/// The HAVING operator.
#[derive(Debug)]
pub struct HavingPlan {
    src: Box<Plan>,
    expr: Expr,
}

impl HavingPlan {
    /// Creates a HAVING filter over `src`.
    #[must_use]
    pub fn new(src: Box<Plan>, expr: Expr) -> Self {
        Self { src, expr }
    }

    pub(crate) fn fields(&self) -> &[ResultField] {
        self.src.fields()
    }

    pub(crate) fn src(&self) -> &Plan {
        &self.src
    }

    pub(crate) fn expr(&self) -> &Expr {
        &self.expr
    }

    pub(crate) fn next(&mut self, ctx: &ExecutionContext) -> QuarryResult<Option<Row>> {
        filter_next(&mut self.src, &self.expr, ctx)
    }

    pub(crate) fn close(&mut self) {
        self.src.close();
    }
}
