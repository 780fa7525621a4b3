//! The pull-based plan tree.
//!
//! A plan is a tagged variant over the operator set; `fields`, `next`,
//! `close` and `filter` dispatch on the tag. Every operator pulls rows from
//! its source via `next`, which yields a [`Row`] or end-of-stream; `close`
//! resets the operator (and its subtree) so it can be pulled again; the
//! join operator relies on this to re-run its inner side. Cancellation is
//! polled once per `next` at the dispatcher, so long scans notice a
//! cancelled context at every pull.

pub mod distinct;
pub mod filter;
pub mod group_by;
pub mod join;
pub mod limit;
pub mod lock;
pub mod order_by;
pub mod row_stack;
pub mod scan;
pub mod select_fields;
pub mod select_final;
pub mod select_list;

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use quarry_codec::Datum;
use quarry_common::error::{QuarryError, QuarryResult};
use quarry_common::types::Key;
use quarry_kv::txn::Transaction;

use crate::expr::Expr;
use crate::field::ResultField;
use crate::session::SessionVars;

pub use distinct::DistinctPlan;
pub use filter::{FilterPlan, HavingPlan};
pub use group_by::GroupByPlan;
pub use join::JoinPlan;
pub use limit::{LimitPlan, OffsetPlan};
pub use lock::LockPlan;
pub use order_by::OrderByPlan;
pub use row_stack::RowStackFromPlan;
pub use scan::TableScanPlan;
pub use select_fields::SelectFieldsPlan;
pub use select_final::SelectFinalPlan;
pub use select_list::SelectList;

/// The origin row key of one participating table.
#[derive(Debug, Clone)]
pub struct RowKeyEntry {
    /// Table the key belongs to.
    pub table: String,
    /// The row's engine key.
    pub key: Key,
}

/// A row flowing through the plan tree: evaluated column values plus the
/// row keys it originated from (one per participating table, consumed by
/// `SELECT ... FOR UPDATE`).
#[derive(Debug, Clone)]
pub struct Row {
    /// Column values.
    pub data: Vec<Datum>,
    /// Origin row keys.
    pub row_keys: Vec<RowKeyEntry>,
}

impl Row {
    /// Creates a row with no origin keys.
    #[must_use]
    pub fn new(data: Vec<Datum>) -> Self {
        Self {
            data,
            row_keys: Vec::new(),
        }
    }
}

/// Per-statement execution state handed to every `next` call.
#[derive(Clone)]
pub struct ExecutionContext {
    /// The statement's transaction.
    pub txn: Arc<Mutex<Transaction>>,
    /// The connection's session variables.
    pub session: Arc<Mutex<SessionVars>>,
    cancelled: Arc<AtomicBool>,
}

impl ExecutionContext {
    /// Creates a context owning a transaction and session.
    #[must_use]
    pub fn new(txn: Transaction, session: SessionVars) -> Self {
        Self {
            txn: Arc::new(Mutex::new(txn)),
            session: Arc::new(Mutex::new(session)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signals cancellation; the next pull on any operator fails with the
    /// cancelled error kind.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was signalled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// The operator tree.
#[derive(Debug)]
pub enum Plan {
    /// Full table scan.
    TableScan(TableScanPlan),
    /// WHERE filter.
    Filter(FilterPlan),
    /// Projection without aggregation.
    SelectFields(SelectFieldsPlan),
    /// Grouping and aggregation.
    GroupBy(GroupByPlan),
    /// HAVING filter.
    Having(HavingPlan),
    /// Duplicate elimination over the visible projection.
    Distinct(DistinctPlan),
    /// ORDER BY sort.
    Order(OrderByPlan),
    /// OFFSET skip.
    Offset(OffsetPlan),
    /// LIMIT cap.
    Limit(LimitPlan),
    /// Hidden-field trim.
    Final(SelectFinalPlan),
    /// Nested-loop join.
    Join(JoinPlan),
    /// Row-lock acquisition.
    Lock(LockPlan),
    /// Origin row-key capture above the source.
    RowStackFrom(RowStackFromPlan),
}

impl Plan {
    /// Returns the ordered output schema.
    #[must_use]
    pub fn fields(&self) -> &[ResultField] {
        match self {
            Plan::TableScan(p) => p.fields(),
            Plan::Filter(p) => p.fields(),
            Plan::SelectFields(p) => p.fields(),
            Plan::GroupBy(p) => p.fields(),
            Plan::Having(p) => p.fields(),
            Plan::Distinct(p) => p.fields(),
            Plan::Order(p) => p.fields(),
            Plan::Offset(p) => p.fields(),
            Plan::Limit(p) => p.fields(),
            Plan::Final(p) => p.fields(),
            Plan::Join(p) => p.fields(),
            Plan::Lock(p) => p.fields(),
            Plan::RowStackFrom(p) => p.fields(),
        }
    }

    /// Pulls the next row, or None at end-of-stream.
    pub fn next(&mut self, ctx: &ExecutionContext) -> QuarryResult<Option<Row>> {
        if ctx.is_cancelled() {
            return Err(QuarryError::Cancelled);
        }
        match self {
            Plan::TableScan(p) => p.next(ctx),
            Plan::Filter(p) => p.next(ctx),
            Plan::SelectFields(p) => p.next(ctx),
            Plan::GroupBy(p) => p.next(ctx),
            Plan::Having(p) => p.next(ctx),
            Plan::Distinct(p) => p.next(ctx),
            Plan::Order(p) => p.next(ctx),
            Plan::Offset(p) => p.next(ctx),
            Plan::Limit(p) => p.next(ctx),
            Plan::Final(p) => p.next(ctx),
            Plan::Join(p) => p.next(ctx),
            Plan::Lock(p) => p.next(ctx),
            Plan::RowStackFrom(p) => p.next(ctx),
        }
    }

    /// Resets the operator and its subtree. Idempotent; safe to call before
    /// exhaustion. A closed subtree restarts on the next pull.
    pub fn close(&mut self) {
        match self {
            Plan::TableScan(p) => p.close(),
            Plan::Filter(p) => p.close(),
            Plan::SelectFields(p) => p.close(),
            Plan::GroupBy(p) => p.close(),
            Plan::Having(p) => p.close(),
            Plan::Distinct(p) => p.close(),
            Plan::Order(p) => p.close(),
            Plan::Offset(p) => p.close(),
            Plan::Limit(p) => p.close(),
            Plan::Final(p) => p.close(),
            Plan::Join(p) => p.close(),
            Plan::Lock(p) => p.close(),
            Plan::RowStackFrom(p) => p.close(),
        }
    }

    /// Offers a WHERE predicate for pushdown. Returns the (possibly
    /// rewritten) plan and whether the predicate was absorbed; refused
    /// predicates are wrapped by an explicit filter operator.
    pub fn filter(self, ctx: &ExecutionContext, expr: &Expr) -> QuarryResult<(Plan, bool)> {
        match self {
            Plan::Join(join) => join.try_filter(ctx, expr),
            Plan::RowStackFrom(row_stack) => row_stack.try_filter(ctx, expr),
            other => Ok((other, false)),
        }
    }

    /// Returns the operator name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Plan::TableScan(_) => "TableScan",
            Plan::Filter(_) => "Filter",
            Plan::SelectFields(_) => "SelectFields",
            Plan::GroupBy(_) => "GroupBy",
            Plan::Having(_) => "Having",
            Plan::Distinct(_) => "Distinct",
            Plan::Order(_) => "Order",
            Plan::Offset(_) => "Offset",
            Plan::Limit(_) => "Limit",
            Plan::Final(_) => "Final",
            Plan::Join(_) => "Join",
            Plan::Lock(_) => "Lock",
            Plan::RowStackFrom(_) => "RowStackFrom",
        }
    }

    /// Renders the plan tree, one operator per line.
    #[must_use]
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(0, &mut out);
        out
    }

    fn explain_into(&self, indent: usize, out: &mut String) {
        let _ = write!(out, "{}{}", "  ".repeat(indent), self.name());
        match self {
            Plan::TableScan(p) => {
                let _ = write!(out, " (table={})", p.table_name());
            }
            Plan::Filter(p) => {
                let _ = write!(out, " ({})", p.expr());
            }
            Plan::Having(p) => {
                let _ = write!(out, " ({})", p.expr());
            }
            Plan::GroupBy(p) => {
                let _ = write!(out, " (groups={})", p.group_by_len());
            }
            Plan::Order(p) => {
                let _ = write!(out, " (cols={})", p.by_len());
            }
            Plan::Offset(p) => {
                let _ = write!(out, " (n={})", p.count());
            }
            Plan::Limit(p) => {
                let _ = write!(out, " (n={})", p.count());
            }
            Plan::Join(p) => {
                let _ = write!(out, " (type={})", p.join_type());
            }
            _ => {}
        }
        out.push('\n');
        for child in self.children() {
            child.explain_into(indent + 1, out);
        }
    }

    fn children(&self) -> Vec<&Plan> {
        match self {
            Plan::TableScan(_) => Vec::new(),
            Plan::Filter(p) => vec![p.src()],
            Plan::SelectFields(p) => p.src().into_iter().collect(),
            Plan::GroupBy(p) => vec![p.src()],
            Plan::Having(p) => vec![p.src()],
            Plan::Distinct(p) => vec![p.src()],
            Plan::Order(p) => vec![p.src()],
            Plan::Offset(p) => vec![p.src()],
            Plan::Limit(p) => vec![p.src()],
            Plan::Final(p) => vec![p.src()],
            Plan::Join(p) => vec![p.left(), p.right()],
            Plan::Lock(p) => vec![p.src()],
            Plan::RowStackFrom(p) => vec![p.src()],
        }
    }
}
