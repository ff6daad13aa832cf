//! Evaluator for parsed trend condition expressions
//!
//! Evaluation walks the expression tree against a set of variable
//! bindings. It is a closed interpreter: no host functions, no I/O, no
//! recursion beyond the expression's own depth, so a hostile or malformed
//! expression can fail but cannot reach the host process.
//!
//! Failures here are per-instant conditions (an unbound name, a variable
//! with no value at this instant, a type mismatch); the expression engine
//! catches them point by point and keeps its stream alive.

use std::collections::HashMap;

use thiserror::Error;

use super::parse::{BinOp, Expr, Literal, UnaryOp};
use crate::interp::TypedValue;

/// Errors that can occur while evaluating an expression at one instant
#[derive(Error, Debug)]
pub enum EvalError {
    /// The expression references a name with no bound variable
    #[error("unknown identifier: {0}")]
    UnknownIdent(String),

    /// The bound variable has no value at this instant
    #[error("variable '{0}' has no value at this instant")]
    AbsentValue(String),

    /// Operand types do not fit the operator
    #[error("type error: {0}")]
    Type(String),

    /// Integer division or remainder by zero
    #[error("integer division by zero")]
    DivisionByZero,
}

/// Variable values at one instant; `None` marks a variable that is bound
/// but has no value there
pub type Bindings = HashMap<String, Option<TypedValue>>;

/// Evaluate an expression against the bindings for one instant
pub fn eval(expr: &Expr, env: &Bindings) -> Result<TypedValue, EvalError> {
    match expr {
        Expr::Literal(Literal::Bool(b)) => Ok(TypedValue::Bool(*b)),
        Expr::Literal(Literal::Int(i)) => Ok(TypedValue::Int(*i)),
        Expr::Literal(Literal::Float(f)) => Ok(TypedValue::Float(*f)),

        Expr::Ident(name) => match env.get(name) {
            None => Err(EvalError::UnknownIdent(name.clone())),
            Some(None) => Err(EvalError::AbsentValue(name.clone())),
            Some(Some(value)) => Ok(*value),
        },

        Expr::Unary(UnaryOp::Not, inner) => Ok(TypedValue::Bool(!eval(inner, env)?.is_truthy())),
        Expr::Unary(UnaryOp::Neg, inner) => match eval(inner, env)? {
            TypedValue::Int(i) => Ok(TypedValue::Int(-i)),
            TypedValue::Float(f) => Ok(TypedValue::Float(-f)),
            TypedValue::Bool(_) => Err(EvalError::Type("cannot negate a boolean".to_string())),
        },

        Expr::Binary(left, BinOp::And, right) => Ok(TypedValue::Bool(
            eval(left, env)?.is_truthy() && eval(right, env)?.is_truthy(),
        )),
        Expr::Binary(left, BinOp::Or, right) => Ok(TypedValue::Bool(
            eval(left, env)?.is_truthy() || eval(right, env)?.is_truthy(),
        )),

        Expr::Binary(left, op, right) => {
            let left = eval(left, env)?;
            let right = eval(right, env)?;
            match op {
                BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                    arithmetic(*op, left, right)
                }
                BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                    compare(*op, left, right)
                }
                BinOp::And | BinOp::Or => unreachable!("handled above"),
            }
        }
    }
}

fn arithmetic(op: BinOp, left: TypedValue, right: TypedValue) -> Result<TypedValue, EvalError> {
    match (left, right) {
        (TypedValue::Int(a), TypedValue::Int(b)) => match op {
            BinOp::Add => Ok(TypedValue::Int(a.wrapping_add(b))),
            BinOp::Sub => Ok(TypedValue::Int(a.wrapping_sub(b))),
            BinOp::Mul => Ok(TypedValue::Int(a.wrapping_mul(b))),
            BinOp::Div => {
                if b == 0 {
                    Err(EvalError::DivisionByZero)
                } else {
                    Ok(TypedValue::Int(a.wrapping_div(b)))
                }
            }
            BinOp::Mod => {
                if b == 0 {
                    Err(EvalError::DivisionByZero)
                } else {
                    Ok(TypedValue::Int(a.wrapping_rem(b)))
                }
            }
            _ => unreachable!("arithmetic called with non-arithmetic operator"),
        },
        (TypedValue::Bool(_), _) | (_, TypedValue::Bool(_)) => Err(EvalError::Type(format!(
            "boolean operand in arithmetic {:?}",
            op
        ))),
        (left, right) => {
            let (a, b) = (left.as_f64(), right.as_f64());
            let result = match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
                BinOp::Mod => a % b,
                _ => unreachable!("arithmetic called with non-arithmetic operator"),
            };
            Ok(TypedValue::Float(result))
        }
    }
}

fn compare(op: BinOp, left: TypedValue, right: TypedValue) -> Result<TypedValue, EvalError> {
    let result = match (left, right) {
        (TypedValue::Bool(a), TypedValue::Bool(b)) => match op {
            BinOp::Eq => a == b,
            BinOp::Ne => a != b,
            _ => {
                return Err(EvalError::Type(
                    "booleans support only == and != comparisons".to_string(),
                ))
            }
        },
        (TypedValue::Bool(_), _) | (_, TypedValue::Bool(_)) => {
            return Err(EvalError::Type(format!(
                "cannot compare boolean and number with {:?}",
                op
            )))
        }
        (TypedValue::Int(a), TypedValue::Int(b)) => match op {
            BinOp::Eq => a == b,
            BinOp::Ne => a != b,
            BinOp::Lt => a < b,
            BinOp::Le => a <= b,
            BinOp::Gt => a > b,
            BinOp::Ge => a >= b,
            _ => unreachable!("compare called with non-comparison operator"),
        },
        (left, right) => {
            let (a, b) = (left.as_f64(), right.as_f64());
            match op {
                BinOp::Eq => a == b,
                BinOp::Ne => a != b,
                BinOp::Lt => a < b,
                BinOp::Le => a <= b,
                BinOp::Gt => a > b,
                BinOp::Ge => a >= b,
                _ => unreachable!("compare called with non-comparison operator"),
            }
        }
    };
    Ok(TypedValue::Bool(result))
}
