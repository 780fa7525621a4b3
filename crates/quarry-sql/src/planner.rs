//! Structural plan assembly.
//!
//! A SELECT plans in a fixed phase order:
//! `from → where → lock → group by → having → select fields → distinct →
//! order by → offset → limit → final`, with the row-stack-from operator
//! inserted directly above the FROM source so origin row keys survive the
//! later phases. There is no cost model; the tree is assembled structurally.

use std::sync::Arc;

use quarry_common::error::{QuarryError, QuarryResult};

use crate::plan::select_list::SelectList;
use crate::plan::{
    DistinctPlan, ExecutionContext, FilterPlan, GroupByPlan, HavingPlan, JoinPlan, LimitPlan,
    LockPlan, OffsetPlan, OrderByPlan, Plan, RowStackFromPlan, SelectFieldsPlan, SelectFinalPlan,
    TableScanPlan,
};
use crate::stmt::{JoinType, OrderByItem, SelectLock, SelectStmt, TableRef};
use crate::storage::Catalog;

/// Builds plans against a catalog.
pub struct Planner {
    catalog: Arc<Catalog>,
}

impl Planner {
    /// Creates a planner.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Assembles the operator tree for a SELECT statement.
    pub fn plan_select(&self, ctx: &ExecutionContext, stmt: &SelectStmt) -> QuarryResult<Plan> {
        let mut plan = match &stmt.from {
            Some(from) => {
                let source = self.plan_table_ref(from)?;
                Some(Plan::RowStackFrom(RowStackFromPlan::new(Box::new(source))))
            }
            None => None,
        };

        if let Some(cond) = &stmt.where_clause {
            let Some(current) = plan.take() else {
                return Err(QuarryError::not_supported("WHERE without FROM"));
            };
            let (current, consumed) = current.filter(ctx, cond)?;
            plan = Some(if consumed {
                current
            } else {
                Plan::Filter(FilterPlan::new(Box::new(current), cond.clone()))
            });
        }

        // Locking reads only apply outside auto-commit.
        let mut lock = stmt.lock;
        if ctx.session.lock().should_autocommit() {
            lock = SelectLock::None;
        }
        if let Some(current) = plan.take() {
            plan = Some(Plan::Lock(LockPlan::new(Box::new(current), lock)));
        }

        let src_fields = plan
            .as_ref()
            .map(|p| p.fields().to_vec())
            .unwrap_or_default();
        let mut select_list = SelectList::resolve(&stmt.fields, &src_fields)?;

        // HAVING and ORDER BY may use values outside the select fields;
        // hoist what they need into the hidden tail before choosing the
        // projection operator.
        let having = stmt
            .having
            .as_ref()
            .map(|expr| select_list.hoist_clause_expr(expr.clone()))
            .transpose()?;
        let order_by = stmt
            .order_by
            .iter()
            .map(|item| {
                Ok(OrderByItem {
                    expr: select_list.hoist_clause_expr(item.expr.clone())?,
                    asc: item.asc,
                })
            })
            .collect::<QuarryResult<Vec<_>>>()?;

        let mut plan = if !select_list.has_agg_fields() && stmt.group_by.is_empty() {
            Plan::SelectFields(SelectFieldsPlan::new(plan.map(Box::new), select_list.clone()))
        } else {
            let src = plan.ok_or_else(|| {
                QuarryError::not_supported("aggregate select without FROM")
            })?;
            Plan::GroupBy(GroupByPlan::new(
                Box::new(src),
                stmt.group_by.clone(),
                select_list.clone(),
            ))
        };

        if let Some(expr) = having {
            plan = Plan::Having(HavingPlan::new(Box::new(plan), expr));
        }
        if stmt.distinct {
            plan = Plan::Distinct(DistinctPlan::new(
                Box::new(plan),
                select_list.hidden_field_offset,
            ));
        }
        if !order_by.is_empty() {
            plan = Plan::Order(OrderByPlan::new(Box::new(plan), order_by));
        }
        if let Some(count) = stmt.offset {
            plan = Plan::Offset(OffsetPlan::new(Box::new(plan), count));
        }
        if let Some(count) = stmt.limit {
            plan = Plan::Limit(LimitPlan::new(Box::new(plan), count));
        }
        let plan = Plan::Final(SelectFinalPlan::new(Box::new(plan), &select_list));

        tracing::debug!(plan = %plan.explain().trim_end(), "planned select");
        Ok(plan)
    }

    fn plan_table_ref(&self, table_ref: &TableRef) -> QuarryResult<Plan> {
        match table_ref {
            TableRef::Table { name } => Ok(Plan::TableScan(TableScanPlan::new(
                self.catalog.table(name)?,
            ))),
            TableRef::Join {
                left,
                right,
                join_type,
                on,
            } => {
                if *join_type == JoinType::Full {
                    return Err(QuarryError::UnsupportedJoinType {
                        join_type: join_type.to_string(),
                    });
                }
                let left = self.plan_table_ref(left)?;
                let right = self.plan_table_ref(right)?;
                Ok(Plan::Join(JoinPlan::new(
                    Box::new(left),
                    Box::new(right),
                    *join_type,
                    on.clone(),
                )))
            }
        }
    }
}
