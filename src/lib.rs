//! Trendstore - historical trend storage and query engine
//!
//! This crate reads the sample archive of a building-automation project:
//! fixed-record binary shard files split across a live data directory and
//! monthly backup directories. It reconstructs point-in-time and interval
//! values across shard boundaries, applies typed interpolation, and
//! evaluates boolean/arithmetic expressions over several signals with
//! freshness constraints.
//!
//! The engine is strictly read-only: it never ingests samples, never talks
//! to a live process, and performs no network I/O. Everything it produces
//! is a lazy, caller-driven iterator; dropping an iterator releases the
//! files it had open.
//!
//! # Components
//!
//! - [`RecordLayout`]: decoding of the two fixed binary record layouts
//! - [`StatusBits`]: status mask interpretation with optional bit names
//! - [`ShardFile`]: indexed timestamp search within one shard file
//! - [`ShardLocator`] / [`DirectoryLocator`]: signal-to-path mapping
//! - [`MetaStore`]: all shards of a signal as one logical series
//! - [`Interpolator`]: typed point-in-time values with ages
//! - [`ExpressionEngine`]: expressions over several signals, run detection
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trendstore::{
//!     EngineConfig, ExpressionEngine, InterpolationMode, Interpolator,
//!     MetaStore, ValueKind, Variable,
//! };
//!
//! let config = EngineConfig::new()
//!     .with_project_dir("/srv/plant")
//!     .with_backup_root("/srv/plant/backup");
//! let store = Arc::new(MetaStore::from_config(&config));
//!
//! // Point-in-time value of one signal
//! let supply = Interpolator::new(store.clone(), "Supply Temp", InterpolationMode::Analog);
//! let value = supply.value_at(1_700_000_000);
//!
//! // Spans where a condition held for at least an hour on fresh data
//! let engine = ExpressionEngine::new(vec![
//!     Variable::new("T", supply, ValueKind::Float),
//!     Variable::new(
//!         "Run",
//!         Interpolator::new(store, "Pump Cmd", InterpolationMode::Digital),
//!         ValueKind::Bool,
//!     ),
//! ])?;
//! for span in engine.true_timespans("T > 60 and Run", start, stop, 3600, 900)? {
//!     println!("{} .. {} ({} samples)", span.start, span.stop, span.samples);
//! }
//! ```

pub mod config;
pub mod error;
pub mod expr;
pub mod interp;
pub mod merge;
pub mod record;
pub mod shard;
pub mod status;
pub mod store;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use expr::{EvalPoint, ExpressionEngine, Timespan, Variable};
pub use interp::{InterpolationMode, Interpolator, SampledSequence, TypedValue, ValueKind};
pub use record::{Record, RecordLayout};
pub use shard::{
    DirectoryLocator, ShardFile, ShardLocator, ShardPeriod, TimestampSearch,
};
pub use status::{BitNames, StatusBits};
pub use store::MetaStore;
