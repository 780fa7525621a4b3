//! SELECT statement AST.
//!
//! The planner consumes an already-parsed SELECT; the parser itself is an
//! external collaborator. The phase order the planner applies is
//! `from → where → lock → group by → having → select fields → distinct →
//! order by → offset → limit → final`.

use crate::expr::Expr;

/// One projection in a select list.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectField {
    /// Projection expression.
    pub expr: Expr,
    /// User-visible name: the alias if one was given, otherwise the
    /// expression text.
    pub name: String,
}

impl SelectField {
    /// Creates a field named after its expression text.
    #[must_use]
    pub fn new(expr: Expr) -> Self {
        let name = expr.to_string();
        Self { expr, name }
    }

    /// Creates a field with an alias.
    #[must_use]
    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        Self {
            expr,
            name: alias.into(),
        }
    }
}

/// Join types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// Cartesian product, optionally filtered by ON.
    Cross,
    /// All left rows, NULL-padded on the right when unmatched.
    Left,
    /// All right rows, NULL-padded on the left when unmatched.
    Right,
    /// Declared but rejected at plan time.
    Full,
}

impl std::fmt::Display for JoinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JoinType::Cross => "CROSS",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
        };
        write!(f, "{name}")
    }
}

/// A FROM clause: a table or a join tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    /// A base table.
    Table {
        /// Table name.
        name: String,
    },
    /// A join of two table references.
    Join {
        /// Left input.
        left: Box<TableRef>,
        /// Right input.
        right: Box<TableRef>,
        /// Join type.
        join_type: JoinType,
        /// ON condition, if any.
        on: Option<Expr>,
    },
}

impl TableRef {
    /// Creates a base-table reference.
    #[must_use]
    pub fn table(name: impl Into<String>) -> Self {
        TableRef::Table { name: name.into() }
    }

    /// Creates a join node.
    #[must_use]
    pub fn join(left: TableRef, right: TableRef, join_type: JoinType, on: Option<Expr>) -> Self {
        TableRef::Join {
            left: Box::new(left),
            right: Box::new(right),
            join_type,
            on,
        }
    }
}

/// Row-locking mode of a SELECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectLock {
    /// No locking.
    #[default]
    None,
    /// `SELECT ... FOR UPDATE`.
    ForUpdate,
}

/// One ORDER BY item.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    /// Sort expression.
    pub expr: Expr,
    /// Ascending when true.
    pub asc: bool,
}

impl OrderByItem {
    /// Creates an ascending item.
    #[must_use]
    pub fn asc(expr: Expr) -> Self {
        Self { expr, asc: true }
    }

    /// Creates a descending item.
    #[must_use]
    pub fn desc(expr: Expr) -> Self {
        Self { expr, asc: false }
    }
}

/// A SELECT statement.
#[derive(Debug, Clone, Default)]
pub struct SelectStmt {
    /// DISTINCT flag.
    pub distinct: bool,
    /// Select list.
    pub fields: Vec<SelectField>,
    /// FROM clause.
    pub from: Option<TableRef>,
    /// WHERE condition.
    pub where_clause: Option<Expr>,
    /// GROUP BY expressions.
    pub group_by: Vec<Expr>,
    /// HAVING condition.
    pub having: Option<Expr>,
    /// ORDER BY items.
    pub order_by: Vec<OrderByItem>,
    /// Rows to skip.
    pub offset: Option<u64>,
    /// Row cap.
    pub limit: Option<u64>,
    /// Locking mode.
    pub lock: SelectLock,
}

impl SelectStmt {
    /// Creates an empty statement; callers fill in the clauses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
