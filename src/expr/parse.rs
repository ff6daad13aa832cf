//! Parser for trend condition expressions
//!
//! The grammar is a small boolean/arithmetic language over bound variable
//! names:
//!
//! ```text
//! expr    := and_expr (("or" | "||") and_expr)*
//! and     := cmp_expr (("and" | "&&") cmp_expr)*
//! cmp     := add_expr (("==" | "!=" | "<=" | ">=" | "<" | ">") add_expr)?
//! add     := mul_expr (("+" | "-") mul_expr)*
//! mul     := unary (("*" | "/" | "%") unary)*
//! unary   := "-" unary | ("not" | "!") unary | primary
//! primary := "(" expr ")" | number | "true" | "false" | identifier
//! ```
//!
//! Parsing is the only fallible step exposed to callers; evaluation of a
//! parsed expression can fail per instant but never aborts a stream.

use winnow::ascii::{digit1, multispace0};
use winnow::combinator::{alt, delimited, opt, preceded, repeat};
use winnow::prelude::*;
use winnow::token::take_while;

use crate::error::{Error, Result};

type PResult<T> = winnow::ModalResult<T>;

/// Literal value in an expression
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Parsed expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Ident(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(Box<Expr>, BinOp, Box<Expr>),
}

/// Parse an expression from a string
pub fn parse(input: &str) -> Result<Expr> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::expression("empty expression"));
    }

    let mut stream = input;
    match expr.parse_next(&mut stream) {
        Ok(parsed) => {
            if stream.trim().is_empty() {
                Ok(parsed)
            } else {
                let offset = input.len() - stream.len();
                Err(Error::expression(format!(
                    "unexpected trailing input at offset {}: {:?}",
                    offset,
                    stream.trim()
                )))
            }
        }
        Err(e) => {
            let offset = input.len() - stream.len();
            Err(Error::expression(format!(
                "parse failure at offset {}: {:?}",
                offset, e
            )))
        }
    }
}

const KEYWORDS: &[&str] = &["and", "or", "not", "true", "false"];

fn ws(input: &mut &str) -> PResult<()> {
    multispace0.void().parse_next(input)
}

fn word<'i>(input: &mut &'i str) -> PResult<&'i str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_').parse_next(input)
}

/// One whole word that must equal `expected`; partial matches such as
/// `andmore` backtrack instead of half-consuming
fn keyword<'i>(
    expected: &'static str,
) -> impl Parser<&'i str, &'i str, winnow::error::ErrMode<winnow::error::ContextError>> {
    word.verify(move |w: &str| w == expected)
}

fn ident(input: &mut &str) -> PResult<String> {
    word.verify(|w: &str| {
        !KEYWORDS.contains(&w) && !w.starts_with(|c: char| c.is_ascii_digit())
    })
    .map(str::to_string)
    .parse_next(input)
}

// ============ Precedence chain ============

fn expr(input: &mut &str) -> PResult<Expr> {
    or_expr.parse_next(input)
}

fn or_op(input: &mut &str) -> PResult<()> {
    alt(("||".void(), keyword("or").void())).parse_next(input)
}

fn or_expr(input: &mut &str) -> PResult<Expr> {
    let first = and_expr.parse_next(input)?;
    let rest: Vec<Expr> = repeat(0.., preceded((ws, or_op, ws), and_expr)).parse_next(input)?;
    Ok(rest.into_iter().fold(first, |l, r| {
        Expr::Binary(Box::new(l), BinOp::Or, Box::new(r))
    }))
}

fn and_op(input: &mut &str) -> PResult<()> {
    alt(("&&".void(), keyword("and").void())).parse_next(input)
}

fn and_expr(input: &mut &str) -> PResult<Expr> {
    let first = cmp_expr.parse_next(input)?;
    let rest: Vec<Expr> = repeat(0.., preceded((ws, and_op, ws), cmp_expr)).parse_next(input)?;
    Ok(rest.into_iter().fold(first, |l, r| {
        Expr::Binary(Box::new(l), BinOp::And, Box::new(r))
    }))
}

fn cmp_op(input: &mut &str) -> PResult<BinOp> {
    alt((
        "==".value(BinOp::Eq),
        "!=".value(BinOp::Ne),
        "<=".value(BinOp::Le),
        ">=".value(BinOp::Ge),
        "<".value(BinOp::Lt),
        ">".value(BinOp::Gt),
    ))
    .parse_next(input)
}

fn cmp_expr(input: &mut &str) -> PResult<Expr> {
    let left = add_expr.parse_next(input)?;
    let rest: Option<(BinOp, Expr)> =
        opt((ws, cmp_op, ws, add_expr).map(|(_, op, _, e)| (op, e))).parse_next(input)?;
    match rest {
        Some((op, right)) => Ok(Expr::Binary(Box::new(left), op, Box::new(right))),
        None => Ok(left),
    }
}

fn add_op(input: &mut &str) -> PResult<BinOp> {
    alt(('+'.value(BinOp::Add), '-'.value(BinOp::Sub))).parse_next(input)
}

fn add_expr(input: &mut &str) -> PResult<Expr> {
    let first = mul_expr.parse_next(input)?;
    let rest: Vec<(BinOp, Expr)> =
        repeat(0.., (ws, add_op, ws, mul_expr).map(|(_, op, _, e)| (op, e))).parse_next(input)?;
    Ok(rest.into_iter().fold(first, |l, (op, r)| {
        Expr::Binary(Box::new(l), op, Box::new(r))
    }))
}

fn mul_op(input: &mut &str) -> PResult<BinOp> {
    alt((
        '*'.value(BinOp::Mul),
        '/'.value(BinOp::Div),
        '%'.value(BinOp::Mod),
    ))
    .parse_next(input)
}

fn mul_expr(input: &mut &str) -> PResult<Expr> {
    let first = unary_expr.parse_next(input)?;
    let rest: Vec<(BinOp, Expr)> = repeat(
        0..,
        (ws, mul_op, ws, unary_expr).map(|(_, op, _, e)| (op, e)),
    )
    .parse_next(input)?;
    Ok(rest.into_iter().fold(first, |l, (op, r)| {
        Expr::Binary(Box::new(l), op, Box::new(r))
    }))
}

fn not_op(input: &mut &str) -> PResult<()> {
    alt(('!'.void(), keyword("not").void())).parse_next(input)
}

fn unary_expr(input: &mut &str) -> PResult<Expr> {
    preceded(
        ws,
        alt((
            preceded(('-', ws), unary_expr).map(|e| Expr::Unary(UnaryOp::Neg, Box::new(e))),
            preceded((not_op, ws), unary_expr).map(|e| Expr::Unary(UnaryOp::Not, Box::new(e))),
            primary,
        )),
    )
    .parse_next(input)
}

// ============ Primary expressions ============

fn primary(input: &mut &str) -> PResult<Expr> {
    preceded(
        ws,
        alt((
            paren_expr,
            literal.map(Expr::Literal),
            ident.map(Expr::Ident),
        )),
    )
    .parse_next(input)
}

fn paren_expr(input: &mut &str) -> PResult<Expr> {
    delimited('(', expr, (ws, ')')).parse_next(input)
}

fn literal(input: &mut &str) -> PResult<Literal> {
    alt((
        number,
        keyword("true").value(Literal::Bool(true)),
        keyword("false").value(Literal::Bool(false)),
    ))
    .parse_next(input)
}

fn number(input: &mut &str) -> PResult<Literal> {
    alt((
        (digit1, '.', digit1)
            .take()
            .try_map(|s: &str| s.parse::<f64>().map(Literal::Float)),
        digit1.try_map(|s: &str| s.parse::<i64>().map(Literal::Int)),
    ))
    .parse_next(input)
}
