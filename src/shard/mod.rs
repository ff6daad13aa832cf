//! Time-sharded sample file access
//!
//! One signal's history is sharded across a live file plus zero or more
//! monthly backup files. Each shard is an immutable, read-only, time-ordered
//! sequence of fixed-size records behind a small fixed header. This module
//! provides the period naming, the signal-to-path mapping, and the indexed
//! per-file search.

mod file;
mod locator;
mod period;

pub use file::{GroupCursor, ShardFile, TimestampSearch, DATA_START_OFFSET, SIGNAL_NAME_LEN};
pub use locator::{DirectoryLocator, ShardLocator};
pub use period::ShardPeriod;
