//! Expression evaluation over multiple signals
//!
//! An [`ExpressionEngine`] binds named, typed interpolators and evaluates
//! a boolean/arithmetic expression over them at every raw sample
//! timestamp of any bound signal, merged into one ascending stream by the
//! same k-way merge that serves multi-shard series.
//!
//! Each evaluated point carries an age: the maximum staleness across all
//! bound variables at that instant. Run detection
//! ([`ExpressionEngine::true_timespans`]) turns the point stream into
//! maximal spans where the expression held true under a freshness
//! constraint.

mod eval;
mod parse;

pub use eval::{eval, Bindings, EvalError};
pub use parse::{parse, BinOp, Expr, Literal, UnaryOp};

use std::collections::HashSet;

use tracing::debug;

use crate::error::{Error, Result};
use crate::interp::{Interpolator, TypedValue, ValueKind};
use crate::merge::KWayMerge;

/// A named, typed binding of one interpolator
#[derive(Clone)]
pub struct Variable {
    name: String,
    interpolator: Interpolator,
    kind: ValueKind,
}

impl Variable {
    /// Bind an interpolator under a name with a result type
    pub fn new(name: impl Into<String>, interpolator: Interpolator, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            interpolator,
            kind,
        }
    }

    /// Name the expression refers to this variable by
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Result type of the variable
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// The bound interpolator
    pub fn interpolator(&self) -> &Interpolator {
        &self.interpolator
    }
}

/// One evaluated point of an expression stream
#[derive(Debug, Clone, PartialEq)]
pub struct EvalPoint {
    /// Merged raw sample timestamp the expression was evaluated at
    pub timestamp: i64,
    /// Evaluated value; absent when evaluation failed at this instant
    pub value: Option<TypedValue>,
    /// Maximum staleness across all bound variables at this instant
    pub age: i64,
}

/// A maximal run where an expression held true under the freshness
/// constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timespan {
    /// First qualifying timestamp of the run
    pub start: i64,
    /// Last qualifying timestamp of the run
    pub stop: i64,
    /// Number of qualifying points inside the run
    pub samples: usize,
}

/// Evaluates expressions over a set of named variables
pub struct ExpressionEngine {
    variables: Vec<Variable>,
}

impl ExpressionEngine {
    /// Create an engine over the given variables.
    ///
    /// Variable names must be unique; a duplicate is a configuration
    /// error.
    pub fn new(variables: Vec<Variable>) -> Result<Self> {
        let mut seen = HashSet::new();
        for var in &variables {
            if !seen.insert(var.name.clone()) {
                return Err(Error::config(format!(
                    "duplicate variable name '{}'",
                    var.name
                )));
            }
        }
        Ok(Self { variables })
    }

    /// The bound variables
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Merged ascending stream of every variable's raw sample timestamps
    /// within the optional bounds.
    ///
    /// One cursor per variable, merged lazily; memory stays bounded by
    /// the variable count. Coinciding timestamps surface once.
    pub fn timestamps(
        &self,
        start: Option<i64>,
        stop: Option<i64>,
    ) -> impl Iterator<Item = i64> {
        let cursors: Vec<Box<dyn Iterator<Item = (i64, ())>>> = self
            .variables
            .iter()
            .map(|var| {
                Box::new(var.interpolator.raw_timestamps(start, stop).map(|ts| (ts, ())))
                    as Box<dyn Iterator<Item = (i64, ())>>
            })
            .collect();
        KWayMerge::new(cursors).map(|(ts, _)| ts)
    }

    /// Evaluate an expression at every merged timestamp.
    ///
    /// Parsing the expression fails the call; evaluation failures at
    /// individual instants are logged, yield an absent value, and never
    /// abort the stream.
    pub fn evaluate(
        &self,
        expression: &str,
        start: Option<i64>,
        stop: Option<i64>,
    ) -> Result<impl Iterator<Item = EvalPoint>> {
        let expr = parse(expression)?;
        let variables = self.variables.clone();
        Ok(self
            .timestamps(start, stop)
            .map(move |ts| evaluate_point(&expr, &variables, ts)))
    }

    /// Detect maximal runs inside `[start, stop]` where the expression is
    /// truthy and no variable is staler than `max_age_seconds`.
    ///
    /// A run closes at its last qualifying timestamp and is emitted only
    /// if it spans at least `min_duration_seconds`. A run still open when
    /// the range ends is flushed under the same duration rule.
    pub fn true_timespans(
        &self,
        expression: &str,
        start: i64,
        stop: i64,
        min_duration_seconds: i64,
        max_age_seconds: i64,
    ) -> Result<impl Iterator<Item = Timespan>> {
        let points = self.evaluate(expression, Some(start), Some(stop))?;
        Ok(TimespanScanner {
            points,
            min_duration: min_duration_seconds,
            max_age: max_age_seconds,
            pending: None,
        })
    }
}

fn evaluate_point(expr: &Expr, variables: &[Variable], ts: i64) -> EvalPoint {
    let mut env = Bindings::with_capacity(variables.len());
    let mut age = 0i64;
    for var in variables {
        let measured = var.interpolator.value_and_age_at(ts);
        if let Some((_, sample_age)) = measured {
            age = age.max(sample_age);
        }
        env.insert(
            var.name.clone(),
            measured.map(|(value, _)| var.kind.convert(value)),
        );
    }

    let value = match eval(expr, &env) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(timestamp = ts, "expression evaluation failed: {}", e);
            None
        }
    };

    EvalPoint {
        timestamp: ts,
        value,
        age,
    }
}

struct PendingSpan {
    start: i64,
    stop: i64,
    samples: usize,
}

/// Two-state run detector over an evaluated point stream.
///
/// OUTSIDE until a point is truthy and fresh enough; INSIDE extends the
/// pending span until the first violating point closes it at the previous
/// qualifying timestamp.
struct TimespanScanner<I> {
    points: I,
    min_duration: i64,
    max_age: i64,
    pending: Option<PendingSpan>,
}

impl<I> TimespanScanner<I> {
    fn close(&mut self) -> Option<Timespan> {
        let span = self.pending.take()?;
        if span.stop - span.start >= self.min_duration {
            Some(Timespan {
                start: span.start,
                stop: span.stop,
                samples: span.samples,
            })
        } else {
            None
        }
    }
}

impl<I> Iterator for TimespanScanner<I>
where
    I: Iterator<Item = EvalPoint>,
{
    type Item = Timespan;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(point) = self.points.next() else {
                // End of range: flush a still-open qualifying run
                return self.close();
            };

            let qualifies = point.value.as_ref().is_some_and(TypedValue::is_truthy)
                && point.age <= self.max_age;

            if qualifies {
                match &mut self.pending {
                    Some(span) => {
                        span.stop = point.timestamp;
                        span.samples += 1;
                    }
                    None => {
                        self.pending = Some(PendingSpan {
                            start: point.timestamp,
                            stop: point.timestamp,
                            samples: 1,
                        });
                    }
                }
            } else if let Some(span) = self.close() {
                return Some(span);
            }
        }
    }
}
