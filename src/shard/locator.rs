//! Signal-to-shard-path mapping
//!
//! All directory-layout knowledge lives behind the [`ShardLocator`] trait
//! so the store never scans directories ad hoc and tests can substitute an
//! in-memory fake without touching a real filesystem.
//!
//! The on-disk convention served by [`DirectoryLocator`]:
//!
//! - live shard:    `<project_dir>/<live_subdir>/<sanitized>.<ext>`
//! - monthly shard: `<backup_root>/Month_<MM>.<YYYY>/<sanitized>.<ext>`

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::shard::ShardPeriod;

/// File-name-safe form of a signal name: every non-alphanumeric character
/// becomes `_`.
///
/// Two distinct signal names can collide after sanitization ("A.B" and
/// "A_B" map to the same file). This is a known, accepted limitation of
/// the on-disk convention; callers must not rely on the mapping being
/// injective.
pub fn sanitized_file_name(signal: &str) -> String {
    signal
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

/// Maps logical signal names to the shard files that may hold their data
pub trait ShardLocator: Send + Sync {
    /// Path of the live shard for a signal
    fn live_path(&self, signal: &str) -> PathBuf;

    /// Every monthly backup period known to exist, in calendar order.
    ///
    /// Period discovery is per backup root, not per signal: a period is
    /// listed even when this particular signal has no file in it.
    fn backup_periods(&self) -> Vec<ShardPeriod>;

    /// Path of the backup shard for a signal in one calendar month
    fn backup_path(&self, signal: &str, year: i32, month: u32) -> PathBuf;

    /// Path of the shard holding `signal` for `period`
    fn shard_path(&self, signal: &str, period: ShardPeriod) -> PathBuf {
        match period {
            ShardPeriod::Live => self.live_path(signal),
            ShardPeriod::Month { year, month } => self.backup_path(signal, year, month),
        }
    }
}

/// Locator for the standard project-directory layout
#[derive(Debug, Clone)]
pub struct DirectoryLocator {
    live_dir: PathBuf,
    backup_root: PathBuf,
    extension: String,
}

impl DirectoryLocator {
    /// Create a locator from the live data directory, the backup root
    /// directory, and the shard file extension (without the dot)
    pub fn new(
        live_dir: impl Into<PathBuf>,
        backup_root: impl Into<PathBuf>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            live_dir: live_dir.into(),
            backup_root: backup_root.into(),
            extension: extension.into(),
        }
    }

    /// The live data directory
    pub fn live_dir(&self) -> &Path {
        &self.live_dir
    }

    /// The backup root directory
    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    fn file_name(&self, signal: &str) -> String {
        format!("{}.{}", sanitized_file_name(signal), self.extension)
    }
}

impl ShardLocator for DirectoryLocator {
    fn live_path(&self, signal: &str) -> PathBuf {
        self.live_dir.join(self.file_name(signal))
    }

    fn backup_periods(&self) -> Vec<ShardPeriod> {
        let entries = match fs::read_dir(&self.backup_root) {
            Ok(entries) => entries,
            Err(e) => {
                // A missing backup root simply means no archived months
                debug!(
                    backup_root = %self.backup_root.display(),
                    error = %e,
                    "backup root not readable, assuming no backup periods"
                );
                return Vec::new();
            }
        };

        let mut periods: Vec<ShardPeriod> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(ShardPeriod::parse_dir_name)
            })
            .collect();
        periods.sort_by_key(|p| p.sort_key());
        periods
    }

    fn backup_path(&self, signal: &str, year: i32, month: u32) -> PathBuf {
        self.backup_root
            .join(format!("Month_{:02}.{:04}", month, year))
            .join(self.file_name(signal))
    }
}
