//! Expression trees.
//!
//! The expression language the planner and operators share: literals,
//! column references, binary and unary operations, aggregate calls, info
//! builtins, and positional references into an extended select list (the
//! rewrite target of hidden-field hoisting).

pub mod aggregate;
pub mod eval;

use std::fmt;

use quarry_codec::Datum;

pub use aggregate::{AggFunc, AggState, Accumulator};
pub use eval::{eval, eval_bool, AggPhase, EvalContext};

use crate::field::check_wildcard;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Logical AND.
    And,
    /// Logical OR.
    Or,
    /// Equality.
    Eq,
    /// Inequality.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        };
        write!(f, "{symbol}")
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical NOT.
    Not,
    /// Arithmetic negation.
    Neg,
}

/// Info builtins backed by the session context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinFunc {
    /// `DATABASE()`: the current schema.
    Database,
    /// `FOUND_ROWS()`: rows found by the last SELECT.
    FoundRows,
    /// `LAST_INSERT_ID()`: last auto-generated row id.
    LastInsertId,
    /// `ROW_COUNT()`: rows affected by the last statement.
    RowCount,
}

impl BuiltinFunc {
    /// Returns the SQL name of the builtin.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            BuiltinFunc::Database => "DATABASE",
            BuiltinFunc::FoundRows => "FOUND_ROWS",
            BuiltinFunc::LastInsertId => "LAST_INSERT_ID",
            BuiltinFunc::RowCount => "ROW_COUNT",
        }
    }
}

/// An expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value.
    Value(Datum),
    /// A column reference, possibly qualified (`t.c`), possibly a wildcard
    /// (`*`, `t.*`) before select-list resolution.
    Ident(String),
    /// A binary operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// A unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// An aggregate call. `COUNT(*)` is an aggregate with no arguments.
    Agg {
        /// Aggregate function.
        func: AggFunc,
        /// Arguments; empty for `COUNT(*)`.
        args: Vec<Expr>,
    },
    /// A 1-based positional reference into the extended select list. The
    /// hidden-hoisting rewrite produces these.
    Position {
        /// 1-based position.
        n: usize,
        /// Display name of the referenced projection.
        name: String,
    },
    /// An info builtin call.
    Builtin {
        /// Builtin function.
        func: BuiltinFunc,
        /// Arguments (currently always empty).
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Creates a literal expression.
    pub fn value(v: impl Into<Datum>) -> Self {
        Expr::Value(v.into())
    }

    /// Creates a column reference.
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    /// Creates a binary expression.
    #[must_use]
    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Creates an aggregate call.
    #[must_use]
    pub fn agg(func: AggFunc, args: Vec<Expr>) -> Self {
        Expr::Agg { func, args }
    }

    /// Creates `COUNT(*)`.
    #[must_use]
    pub fn count_star() -> Self {
        Expr::Agg {
            func: AggFunc::Count,
            args: Vec::new(),
        }
    }

    /// Creates a builtin call.
    #[must_use]
    pub fn builtin(func: BuiltinFunc) -> Self {
        Expr::Builtin {
            func,
            args: Vec::new(),
        }
    }

    /// Returns true if this expression is a bare identifier.
    #[must_use]
    pub fn is_ident(&self) -> bool {
        matches!(self, Expr::Ident(_))
    }

    /// Collects every column name mentioned by this expression, wildcards
    /// included.
    #[must_use]
    pub fn mentioned_columns(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_columns(&mut names);
        names
    }

    fn collect_columns(&self, names: &mut Vec<String>) {
        match self {
            Expr::Ident(name) => names.push(name.clone()),
            Expr::Binary { left, right, .. } => {
                left.collect_columns(names);
                right.collect_columns(names);
            }
            Expr::Unary { operand, .. } => operand.collect_columns(names),
            Expr::Agg { args, .. } | Expr::Builtin { args, .. } => {
                for arg in args {
                    arg.collect_columns(names);
                }
            }
            Expr::Value(_) | Expr::Position { .. } => {}
        }
    }

    /// Returns true if this expression contains an aggregate call.
    #[must_use]
    pub fn contains_agg(&self) -> bool {
        match self {
            Expr::Agg { .. } => true,
            Expr::Binary { left, right, .. } => left.contains_agg() || right.contains_agg(),
            Expr::Unary { operand, .. } => operand.contains_agg(),
            Expr::Builtin { args, .. } => args.iter().any(Expr::contains_agg),
            Expr::Value(_) | Expr::Ident(_) | Expr::Position { .. } => false,
        }
    }

    /// Returns true if this expression mentions a wildcard column.
    #[must_use]
    pub fn mentions_wildcard(&self) -> bool {
        self.mentioned_columns()
            .iter()
            .any(|name| check_wildcard(name).is_some())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Value(Datum::Str(s)) => write!(f, "'{s}'"),
            Expr::Value(d) => write!(f, "{d}"),
            Expr::Ident(name) => write!(f, "{name}"),
            Expr::Binary { op, left, right } => write!(f, "{left} {op} {right}"),
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not => write!(f, "NOT {operand}"),
                UnaryOp::Neg => write!(f, "-{operand}"),
            },
            Expr::Agg { func, args } => {
                if args.is_empty() {
                    write!(f, "{func}(*)")
                } else {
                    write!(f, "{func}(")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    write!(f, ")")
                }
            }
            Expr::Position { name, .. } => write!(f, "{name}"),
            Expr::Builtin { func, args } => {
                write!(f, "{}(", func.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let expr = Expr::binary(Expr::ident("id"), BinaryOp::Ge, Expr::value(20i64));
        assert_eq!(expr.to_string(), "id >= 20");
        assert_eq!(Expr::count_star().to_string(), "COUNT(*)");
        assert_eq!(
            Expr::agg(AggFunc::Sum, vec![Expr::ident("c1")]).to_string(),
            "SUM(c1)"
        );
        assert_eq!(Expr::builtin(BuiltinFunc::Database).to_string(), "DATABASE()");
        assert_eq!(Expr::value("x").to_string(), "'x'");
    }

    #[test]
    fn test_mentioned_columns() {
        let expr = Expr::binary(
            Expr::ident("a"),
            BinaryOp::Add,
            Expr::agg(AggFunc::Max, vec![Expr::ident("b")]),
        );
        assert_eq!(expr.mentioned_columns(), vec!["a", "b"]);
        assert!(Expr::value(1i64).mentioned_columns().is_empty());
    }

    #[test]
    fn test_contains_agg() {
        assert!(Expr::count_star().contains_agg());
        let nested = Expr::binary(Expr::count_star(), BinaryOp::Add, Expr::value(1i64));
        assert!(nested.contains_agg());
        assert!(!Expr::ident("a").contains_agg());
    }

    #[test]
    fn test_mentions_wildcard() {
        assert!(Expr::ident("*").mentions_wildcard());
        assert!(Expr::ident("t.*").mentions_wildcard());
        assert!(!Expr::ident("t.c").mentions_wildcard());
    }
}
