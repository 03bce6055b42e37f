//! Configuration for local-history
//!
//! All settings live in one [`HistoryConfig`], read from a JSON file where
//! every field is optional:
//!
//! ```json
//! {
//!   "storage_path": "/home/me/.local-history",
//!   "days_limit": 30,
//!   "file_size_limit": 262144,
//!   "auto_purge": true
//! }
//! ```

use crate::error::{HistoryError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default number of days kept per original file
pub const DEFAULT_DAYS_LIMIT: i64 = 30;

/// Default maximum size of a snapshotted file (256 KB)
pub const DEFAULT_FILE_SIZE_LIMIT: u64 = 262_144;

/// Name of the store directory when no storage path is configured
pub const DEFAULT_STORE_DIR: &str = "local-history";

/// Settings shared by the purge engine, the revision store and the CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Root of the revision store
    pub storage_path: PathBuf,
    /// Days of revisions kept per original file; signed so a negative value
    /// is caught by policy validation instead of the parser
    pub days_limit: i64,
    /// Files larger than this are not snapshotted (bytes)
    pub file_size_limit: u64,
    /// Purge automatically, at most once a day
    pub auto_purge: bool,
    /// Maximum number of deletions in flight
    pub max_concurrent_deletes: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            days_limit: DEFAULT_DAYS_LIMIT,
            file_size_limit: DEFAULT_FILE_SIZE_LIMIT,
            auto_purge: false,
            max_concurrent_deletes: num_cpus::get() * 4,
        }
    }
}

impl HistoryConfig {
    /// Configuration with defaults and the given storage root
    pub fn with_storage_path(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: storage_path.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: HistoryConfig = serde_json::from_str(&content)?;
        debug!("Loaded configuration from {:?}", path);
        config.validate()?;
        Ok(config)
    }

    /// Write configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Check values that would make the engine unusable
    ///
    /// `days_limit` is checked when a purge starts, so a bad value aborts the
    /// purge and nothing else.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_deletes == 0 {
            return Err(HistoryError::InvalidConfiguration(
                "max_concurrent_deletes must be at least 1".to_string(),
            ));
        }
        if self.storage_path.as_os_str().is_empty() {
            return Err(HistoryError::InvalidConfiguration(
                "storage_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Check a file of `size` bytes against `file_size_limit`
    ///
    /// Only files strictly smaller than the limit are snapshotted.
    pub fn check_file_size(&self, path: &Path, size: u64) -> Result<()> {
        if size >= self.file_size_limit {
            return Err(HistoryError::FileTooLarge {
                path: path.to_path_buf(),
                size,
                limit: self.file_size_limit,
            });
        }
        Ok(())
    }
}

/// Store location used when none is configured
///
/// The store sits next to the installation directory: for a binary in
/// `<prefix>/bin`, that is `<prefix>/local-history`.
pub fn default_storage_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().and_then(Path::parent).map(Path::to_path_buf))
        .map(|prefix| prefix.join(DEFAULT_STORE_DIR))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR))
}
