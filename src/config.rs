//! Configuration for trendstore
//!
//! This module provides the configuration options for the trend engine.
//! The values are plain data: obtaining them (from an INI project file or
//! any other source) is the job of an external configuration collaborator,
//! not of this crate.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::record::RecordLayout;
use crate::shard::DirectoryLocator;

fn default_live_subdir() -> String {
    "dat".to_string()
}

fn default_extension() -> String {
    "hst".to_string()
}

/// Configuration options for a trend engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct EngineConfig {
    /// Project directory holding the live data subdirectory
    pub project_dir: PathBuf,

    /// Root directory holding `Month_<MM>.<YYYY>` backup subdirectories.
    ///
    /// Supplied as a plain path by the external configuration
    /// collaborator.
    pub backup_root: PathBuf,

    /// Subdirectory of the project directory holding live shard files
    #[serde(default = "default_live_subdir")]
    pub live_subdir: String,

    /// Shard file extension, without the dot
    #[serde(default = "default_extension")]
    pub file_extension: String,

    /// On-disk record layout of every shard file in this project.
    ///
    /// Selected explicitly by the caller; shard contents are never
    /// sniffed.
    #[serde(default)]
    pub layout: RecordLayout,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            backup_root: PathBuf::from("./backup"),
            live_subdir: default_live_subdir(),
            file_extension: default_extension(),
            layout: RecordLayout::default(),
        }
    }
}

impl EngineConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the project directory
    pub fn with_project_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.project_dir = path.as_ref().to_path_buf();
        self
    }

    /// Set the backup root directory
    pub fn with_backup_root<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.backup_root = path.as_ref().to_path_buf();
        self
    }

    /// Set the live data subdirectory name
    pub fn with_live_subdir(mut self, subdir: impl Into<String>) -> Self {
        self.live_subdir = subdir.into();
        self
    }

    /// Set the shard file extension
    pub fn with_file_extension(mut self, extension: impl Into<String>) -> Self {
        self.file_extension = extension.into();
        self
    }

    /// Set the record layout
    pub fn with_layout(mut self, layout: RecordLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Directory holding the live shard files
    pub fn live_dir(&self) -> PathBuf {
        self.project_dir.join(&self.live_subdir)
    }

    /// Build the standard directory locator for this configuration
    pub fn locator(&self) -> DirectoryLocator {
        DirectoryLocator::new(
            self.live_dir(),
            self.backup_root.clone(),
            self.file_extension.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::ShardLocator;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.live_subdir, "dat");
        assert_eq!(config.file_extension, "hst");
        assert_eq!(config.layout, RecordLayout::Compact);
    }

    #[test]
    fn test_builder_methods() {
        let config = EngineConfig::new()
            .with_project_dir("/proj")
            .with_backup_root("/archive")
            .with_file_extension("trd")
            .with_layout(RecordLayout::Extended);

        assert_eq!(config.live_dir(), PathBuf::from("/proj/dat"));
        let locator = config.locator();
        assert_eq!(
            locator.live_path("Fan 1"),
            PathBuf::from("/proj/dat/Fan_1.trd")
        );
        assert_eq!(
            locator.backup_path("Fan 1", 2022, 7),
            PathBuf::from("/archive/Month_07.2022/Fan_1.trd")
        );
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"project_dir": "/p", "backup_root": "/b"}"#,
        )
        .unwrap();
        assert_eq!(config.live_subdir, "dat");
        assert_eq!(config.layout, RecordLayout::Compact);

        let config: EngineConfig = serde_json::from_str(
            r#"{"project_dir": "/p", "backup_root": "/b", "layout": "Extended"}"#,
        )
        .unwrap();
        assert_eq!(config.layout, RecordLayout::Extended);
    }
}
