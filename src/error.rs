//! Error handling for trendstore
//!
//! This module provides the error type and result alias shared by every
//! component of the engine.
//!
//! Errors local to a single shard (`Format`, `MissingShard`, `EmptyShard`)
//! are isolated by multi-shard operations: the shard is skipped and the
//! query continues. Only call-time misuse (`Config`, `Expression`) is
//! surfaced to the caller.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in trendstore operations
#[derive(Error, Debug)]
pub enum Error {
    /// A record buffer or shard file is corrupt, truncated, or not a whole
    /// number of records
    #[error("Format error in {origin}: {message}")]
    Format {
        origin: String,
        message: String,
    },

    /// An expected shard file is not present.
    ///
    /// This is a normal, frequent condition (most signals have no backup
    /// for most months) and is never logged loudly.
    #[error("Shard file not present: {path:?}")]
    MissingShard {
        path: PathBuf,
    },

    /// A shard file is well-formed but contains zero records
    #[error("Shard contains no records: {path:?}")]
    EmptyShard {
        path: PathBuf,
    },

    /// Errors related to configuration or call-time misuse
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to expression parsing
    #[error("Expression error: {0}")]
    Expression(String),

    /// Errors related to I/O operations
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for trendstore operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new format error
    pub fn format(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Format {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Create a new missing-shard error
    pub fn missing_shard(path: impl Into<PathBuf>) -> Self {
        Self::MissingShard { path: path.into() }
    }

    /// Create a new empty-shard error
    pub fn empty_shard(path: impl Into<PathBuf>) -> Self {
        Self::EmptyShard { path: path.into() }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new expression error
    pub fn expression(message: impl Into<String>) -> Self {
        Self::Expression(message.into())
    }

    /// Check if this is a format error
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format { .. })
    }

    /// Check if this is a missing-shard error
    pub fn is_missing_shard(&self) -> bool {
        matches!(self, Self::MissingShard { .. })
    }

    /// Check if this is an empty-shard error
    pub fn is_empty_shard(&self) -> bool {
        matches!(self, Self::EmptyShard { .. })
    }

    /// Check if this error is local to one shard and can be skipped by a
    /// multi-shard query
    pub fn is_shard_local(&self) -> bool {
        matches!(
            self,
            Self::Format { .. } | Self::MissingShard { .. } | Self::EmptyShard { .. }
        )
    }
}
