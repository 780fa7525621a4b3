//! # quarry-sql
//!
//! SQL execution pipeline for QuarryDB.
//!
//! This crate turns a parsed SELECT statement into a pull-based operator
//! tree over the MVCC key-value layer. It implements:
//!
//! - Session variables and the startup-built system variable registry
//! - Result fields and identifier binding
//! - Expression trees, aggregates, and the typed evaluation context
//! - The catalog and the row/table facade over `quarry-kv`
//! - The operator set (scan, filter, projection, group-by, having,
//!   distinct, order, offset, limit, final, join, lock, row-stack-from)
//! - Select-list resolution with hidden-field hoisting
//! - The phase-ordered planner and the recordset driver

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod expr;
pub mod field;
pub mod plan;
pub mod planner;
pub mod recordset;
pub mod session;
pub mod stmt;
pub mod storage;

pub use expr::{AggFunc, BinaryOp, BuiltinFunc, Expr, UnaryOp};
pub use field::ResultField;
pub use plan::{ExecutionContext, Plan, Row};
pub use planner::Planner;
pub use recordset::Recordset;
pub use session::{SessionVars, SystemVarRegistry};
pub use stmt::{JoinType, OrderByItem, SelectField, SelectLock, SelectStmt, TableRef};
pub use storage::{Catalog, TableInfo};
