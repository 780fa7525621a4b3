//! Expression evaluation.
//!
//! Evaluation runs against an [`EvalContext`], an explicit record with typed
//! fields: the session variables (for info builtins), the current row view
//! (fields plus data, for identifier resolution), and the aggregate state
//! plus phase. A builtin that needs a missing context field fails at entry.

use std::cell::RefCell;

use quarry_codec::Datum;
use quarry_common::error::{QuarryError, QuarryResult};

use crate::field::{find_field, NameMatch, ResultField};
use crate::session::SessionVars;

use super::aggregate::AggState;
use super::{BinaryOp, BuiltinFunc, Expr, UnaryOp};

/// Which half of the two-phase aggregate walk is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggPhase {
    /// Aggregate nodes consume the current row and yield NULL.
    Accumulate,
    /// Aggregate nodes yield their accumulated result.
    Finalize,
}

/// The evaluation context.
pub struct EvalContext<'a> {
    /// Session variables; absent outside a connection (builtins then fail).
    pub session: Option<&'a SessionVars>,
    /// Fields of the current row.
    pub fields: &'a [ResultField],
    /// Data of the current row.
    pub data: &'a [Datum],
    /// Aggregate state; present only under a group-by evaluation.
    pub aggs: Option<&'a RefCell<AggState>>,
    /// Aggregate walk phase.
    pub phase: AggPhase,
}

impl<'a> EvalContext<'a> {
    /// Creates a context with no row and no session.
    #[must_use]
    pub fn new() -> EvalContext<'static> {
        EvalContext {
            session: None,
            fields: &[],
            data: &[],
            aggs: None,
            phase: AggPhase::Finalize,
        }
    }

    /// Creates a context over a row view.
    #[must_use]
    pub fn with_row(fields: &'a [ResultField], data: &'a [Datum]) -> Self {
        EvalContext {
            session: None,
            fields,
            data,
            aggs: None,
            phase: AggPhase::Finalize,
        }
    }
}

/// Evaluates `expr` against `ctx`.
pub fn eval(expr: &Expr, ctx: &EvalContext<'_>) -> QuarryResult<Datum> {
    match expr {
        Expr::Value(datum) => Ok(datum.clone()),
        Expr::Ident(name) => resolve_ident(name, ctx),
        Expr::Position { n, name } => n
            .checked_sub(1)
            .and_then(|idx| ctx.data.get(idx))
            .cloned()
            .ok_or_else(|| {
                QuarryError::expression(format!("position {n} ({name}) out of range"))
            }),
        Expr::Binary { op, left, right } => eval_binary(*op, left, right, ctx),
        Expr::Unary { op, operand } => eval_unary(*op, operand, ctx),
        Expr::Agg { func, args } => eval_agg(*func, args, ctx),
        Expr::Builtin { func, .. } => eval_builtin(*func, ctx),
    }
}

/// Evaluates `expr` and coerces the result to a boolean; NULL is false.
pub fn eval_bool(expr: &Expr, ctx: &EvalContext<'_>) -> QuarryResult<bool> {
    Ok(eval(expr, ctx)?.is_truthy())
}

fn resolve_ident(name: &str, ctx: &EvalContext<'_>) -> QuarryResult<Datum> {
    let idx = find_field(ctx.fields, name, NameMatch::Resolve)
        .ok_or_else(|| QuarryError::UnknownColumn {
            name: name.to_string(),
        })?;
    ctx.data.get(idx).cloned().ok_or_else(|| {
        QuarryError::internal(format!("field {name} resolved past row width"))
    })
}

fn eval_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    ctx: &EvalContext<'_>,
) -> QuarryResult<Datum> {
    match op {
        BinaryOp::And | BinaryOp::Or => eval_logical(op, left, right, ctx),
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let l = eval(left, ctx)?;
            let r = eval(right, ctx)?;
            if l.is_null() || r.is_null() {
                return Ok(Datum::Null);
            }
            let ordering = l.cmp_order(&r);
            let result = match op {
                BinaryOp::Eq => ordering.is_eq(),
                BinaryOp::Ne => ordering.is_ne(),
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::Ge => ordering.is_ge(),
                _ => unreachable!(),
            };
            Ok(Datum::from(result))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
            let l = eval(left, ctx)?;
            let r = eval(right, ctx)?;
            eval_arith(op, &l, &r)
        }
    }
}

/// Three-valued AND / OR.
fn eval_logical(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    ctx: &EvalContext<'_>,
) -> QuarryResult<Datum> {
    let l = eval(left, ctx)?;
    let r = eval(right, ctx)?;
    let l_truth = if l.is_null() { None } else { Some(l.is_truthy()) };
    let r_truth = if r.is_null() { None } else { Some(r.is_truthy()) };
    let result = match op {
        BinaryOp::And => match (l_truth, r_truth) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        BinaryOp::Or => match (l_truth, r_truth) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
        _ => unreachable!(),
    };
    Ok(match result {
        Some(b) => Datum::from(b),
        None => Datum::Null,
    })
}

fn eval_arith(op: BinaryOp, l: &Datum, r: &Datum) -> QuarryResult<Datum> {
    if l.is_null() || r.is_null() {
        return Ok(Datum::Null);
    }

    // Division always runs in the float domain; NULL on division by zero.
    if op == BinaryOp::Div {
        let (a, b) = float_operands(op, l, r)?;
        if b == 0.0 {
            return Ok(Datum::Null);
        }
        return Ok(Datum::F64(a / b));
    }

    if let (Datum::I64(a), Datum::I64(b)) = (l, r) {
        let result = match op {
            BinaryOp::Add => a.checked_add(*b),
            BinaryOp::Sub => a.checked_sub(*b),
            BinaryOp::Mul => a.checked_mul(*b),
            _ => unreachable!(),
        };
        return result.map(Datum::I64).ok_or_else(|| {
            QuarryError::expression(format!("integer overflow in {a} {op} {b}"))
        });
    }

    let (a, b) = float_operands(op, l, r)?;
    Ok(Datum::F64(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        _ => unreachable!(),
    }))
}

fn float_operands(op: BinaryOp, l: &Datum, r: &Datum) -> QuarryResult<(f64, f64)> {
    match (l.to_f64(), r.to_f64()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(QuarryError::expression(format!(
            "invalid operands for {op}: {l}, {r}"
        ))),
    }
}

fn eval_unary(op: UnaryOp, operand: &Expr, ctx: &EvalContext<'_>) -> QuarryResult<Datum> {
    let value = eval(operand, ctx)?;
    if value.is_null() {
        return Ok(Datum::Null);
    }
    match op {
        UnaryOp::Not => Ok(Datum::from(!value.is_truthy())),
        UnaryOp::Neg => match value {
            Datum::I64(v) => v
                .checked_neg()
                .map(Datum::I64)
                .ok_or_else(|| QuarryError::expression("integer overflow in negation")),
            Datum::F64(v) => Ok(Datum::F64(-v)),
            other => match other.to_f64() {
                Some(f) => Ok(Datum::F64(-f)),
                None => Err(QuarryError::expression(format!("cannot negate {other}"))),
            },
        },
    }
}

fn eval_agg(
    func: super::AggFunc,
    args: &[Expr],
    ctx: &EvalContext<'_>,
) -> QuarryResult<Datum> {
    let aggs = ctx.aggs.ok_or_else(|| {
        QuarryError::expression(format!("{func} used outside an aggregation context"))
    })?;
    match ctx.phase {
        AggPhase::Accumulate => {
            // COUNT(*) counts rows through a constant input.
            let input = match args.first() {
                Some(arg) => eval(arg, ctx)?,
                None => Datum::I64(1),
            };
            aggs.borrow_mut().accumulate(func, &input)?;
            Ok(Datum::Null)
        }
        AggPhase::Finalize => Ok(aggs.borrow_mut().finalize(func)),
    }
}

fn eval_builtin(func: BuiltinFunc, ctx: &EvalContext<'_>) -> QuarryResult<Datum> {
    // A missing session context is a programmer error, not a SQL error.
    let session = ctx.session.ok_or(QuarryError::KeyNotFound)?;
    Ok(match func {
        BuiltinFunc::Database => match &session.current_schema {
            Some(schema) => Datum::str(schema.clone()),
            None => Datum::Null,
        },
        BuiltinFunc::FoundRows => Datum::U64(session.found_rows),
        BuiltinFunc::LastInsertId => Datum::U64(session.last_insert_id),
        BuiltinFunc::RowCount => Datum::I64(session.affected_rows as i64),
    })
}
