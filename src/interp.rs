//! Typed interpolation over a signal's raw records
//!
//! An [`Interpolator`] turns the raw records of one signal into a typed
//! value at an arbitrary instant, together with an age: the time distance
//! to the nearest real sample that produced the value.
//!
//! Two modes exist. `Digital` holds the last known value between samples.
//! `Analog` interpolates linearly between the neighboring samples in
//! proportion to elapsed real time, with one exception: a sample carrying
//! the change flag is authoritative at its own instant and is never
//! smoothed backward, so the interpolator holds the previous value up to
//! it.
//!
//! Instants outside the signal's recorded range yield no value at all,
//! never a fabricated zero.

use std::sync::Arc;
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::status::StatusBits;
use crate::store::MetaStore;
use crate::record::Record;
use crate::shard::TimestampSearch;

/// Interpolation mode of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMode {
    /// Last-known-value hold
    Digital,
    /// Time-proportional linear interpolation
    Analog,
}

/// Result type requested from a typed query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Boolean: value >= 0.5 reads as true
    Bool,
    /// Integer: value truncated toward zero
    Int,
    /// Floating point, unchanged
    Float,
}

impl ValueKind {
    /// Convert a raw interpolated value into this kind's typed view
    pub fn convert(&self, value: f64) -> TypedValue {
        match self {
            ValueKind::Bool => TypedValue::Bool(value >= 0.5),
            ValueKind::Int => TypedValue::Int(value.trunc() as i64),
            ValueKind::Float => TypedValue::Float(value),
        }
    }
}

/// A typed interpolated value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypedValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl TypedValue {
    /// Truthiness used by expression evaluation and run detection
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
        }
    }

    /// Numeric view of the value; booleans read as 0.0 / 1.0
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Int(i) => *i as f64,
            Self::Float(f) => *f,
        }
    }
}

/// A raw interpolation result before typing
#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    value: f64,
    age: i64,
}

/// Arithmetic mean of a group's values, reconciling duplicate-write races
fn combined_value(records: &[Record]) -> f64 {
    let sum: f64 = records.iter().map(|r| r.value).sum();
    sum / records.len() as f64
}

/// Point-in-time typed access to one signal
#[derive(Clone)]
pub struct Interpolator {
    store: Arc<MetaStore>,
    signal: String,
    mode: InterpolationMode,
    /// Recorded range of the signal, resolved once per session
    range: OnceLock<Option<(i64, i64)>>,
}

impl Interpolator {
    /// Create an interpolator for one signal of a store
    pub fn new(store: Arc<MetaStore>, signal: impl Into<String>, mode: InterpolationMode) -> Self {
        Self {
            store,
            signal: signal.into(),
            mode,
            range: OnceLock::new(),
        }
    }

    /// Signal name this interpolator reads
    pub fn signal(&self) -> &str {
        &self.signal
    }

    /// Interpolation mode
    pub fn mode(&self) -> InterpolationMode {
        self.mode
    }

    fn recorded_range(&self) -> Option<(i64, i64)> {
        *self.range.get_or_init(|| {
            let first = self.store.first_timestamp(&self.signal)?;
            let last = self.store.last_timestamp(&self.signal)?;
            Some((first, last))
        })
    }

    /// Whether the signal has recorded data covering `t`
    pub fn has_data(&self, t: i64) -> bool {
        match self.recorded_range() {
            Some((first, last)) => first <= t && t <= last,
            None => false,
        }
    }

    fn sample(&self, t: i64) -> Option<Sample> {
        if !self.has_data(t) {
            return None;
        }

        match self.store.query(&self.signal, t) {
            TimestampSearch::Exact(records) => Some(Sample {
                value: combined_value(&records),
                age: 0,
            }),
            TimestampSearch::Neighbors { before, after } => {
                let first = before.first()?;
                let t0 = first.timestamp;
                let v0 = combined_value(&before);

                match self.mode {
                    InterpolationMode::Digital => Some(Sample {
                        value: v0,
                        age: t - t0,
                    }),
                    InterpolationMode::Analog => {
                        // A change-flagged sample is authoritative at its
                        // own instant; hold the previous value up to it.
                        let change_ahead = after
                            .iter()
                            .any(|r| StatusBits::is_change_flag(r.status));
                        if after.is_empty() || change_ahead {
                            return Some(Sample {
                                value: v0,
                                age: t - t0,
                            });
                        }

                        let t1 = after[0].timestamp;
                        let v1 = combined_value(&after);
                        let fraction = (t - t0) as f64 / (t1 - t0) as f64;
                        Some(Sample {
                            value: v0 + (v1 - v0) * fraction,
                            age: (t - t0).min(t1 - t),
                        })
                    }
                }
            }
        }
    }

    /// Interpolated value at `t`; absent outside the recorded range
    pub fn value_at(&self, t: i64) -> Option<f64> {
        self.sample(t).map(|s| s.value)
    }

    /// Age of the value at `t`: 0 for an exact hit, otherwise the time
    /// distance to the nearest real sample used to produce the value
    pub fn age_at(&self, t: i64) -> Option<i64> {
        self.sample(t).map(|s| s.age)
    }

    /// Boolean view: true iff the value is >= 0.5 (0.5 rounds up)
    pub fn as_bool(&self, t: i64) -> Option<bool> {
        self.value_at(t).map(|v| v >= 0.5)
    }

    /// Integer view: value truncated toward zero
    pub fn as_int(&self, t: i64) -> Option<i64> {
        self.value_at(t).map(|v| v.trunc() as i64)
    }

    /// Floating-point view of the value
    pub fn as_float(&self, t: i64) -> Option<f64> {
        self.value_at(t)
    }

    /// Typed view selected by `kind`
    pub fn typed_value_at(&self, t: i64, kind: ValueKind) -> Option<TypedValue> {
        self.value_at(t).map(|v| kind.convert(v))
    }

    /// Value and age together, from a single underlying query
    pub fn value_and_age_at(&self, t: i64) -> Option<(f64, i64)> {
        self.sample(t).map(|s| (s.value, s.age))
    }

    /// Ascending raw sample timestamps of the signal within the optional
    /// bounds
    pub fn raw_timestamps(
        &self,
        start: Option<i64>,
        stop: Option<i64>,
    ) -> impl Iterator<Item = i64> {
        self.store
            .groups(&self.signal, start, stop)
            .map(|(ts, _)| ts)
    }

    /// Finite lazy sequence of typed values at a fixed stride.
    ///
    /// The stride sign must agree with the direction from `start` to
    /// `stop`; a zero or opposing stride is a configuration error. The
    /// sequence is restarted by calling this again, not by rewinding.
    pub fn sampled(
        &self,
        start: i64,
        stop: i64,
        step: i64,
        kind: ValueKind,
    ) -> Result<SampledSequence> {
        if step == 0 {
            return Err(Error::config("sample stride must not be zero"));
        }
        if (stop - start).signum() * step.signum() < 0 {
            return Err(Error::config(format!(
                "stride {} opposes the range {}..{}",
                step, start, stop
            )));
        }

        Ok(SampledSequence {
            interpolator: self.clone(),
            kind,
            current: start,
            stop,
            step,
            exhausted: false,
        })
    }
}

/// Finite lazy sequence of `(timestamp, typed value)` pairs at a fixed
/// stride
pub struct SampledSequence {
    interpolator: Interpolator,
    kind: ValueKind,
    current: i64,
    stop: i64,
    step: i64,
    exhausted: bool,
}

impl Iterator for SampledSequence {
    type Item = (i64, Option<TypedValue>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let in_range = if self.step > 0 {
            self.current <= self.stop
        } else {
            self.current >= self.stop
        };
        if !in_range {
            self.exhausted = true;
            return None;
        }

        let t = self.current;
        match self.current.checked_add(self.step) {
            Some(next) => self.current = next,
            None => self.exhausted = true,
        }
        Some((t, self.interpolator.typed_value_at(t, self.kind)))
    }
}
