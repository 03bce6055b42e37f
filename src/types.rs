//! Core data types shared across the library
//!
//! ## Overview
//!
//! - **Reports**: [`PurgeReport`], [`PurgeFailure`] - outcome of one purge run
//! - **Store statistics**: [`StoreStats`] - what the revision store currently holds
//!
//! ## Examples
//!
//! ```rust
//! use local_history::types::{FailureKind, PurgeFailure, PurgeReport};
//! use std::path::PathBuf;
//!
//! let mut report = PurgeReport::default();
//! report.files_deleted = 3;
//! report.failures.push(PurgeFailure {
//!     path: Some(PathBuf::from("/store/a/2024-01-01_10-00-00_x.txt")),
//!     kind: FailureKind::Delete,
//!     cause: "Permission denied".to_string(),
//! });
//!
//! assert!(!report.is_clean());
//! assert_eq!(report.failure_count(FailureKind::Delete), 1);
//! ```

use crate::error::HistoryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Stage a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Reading the store
    Scan,
    /// Deleting an expired revision
    Delete,
    /// Removing an emptied directory
    DirRemove,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Scan => "scan",
            FailureKind::Delete => "delete",
            FailureKind::DirRemove => "dir-remove",
        };
        f.write_str(name)
    }
}

/// One failure recorded during a purge run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeFailure {
    /// Path involved, when the failure concerns one
    pub path: Option<PathBuf>,
    /// Stage the failure happened in
    pub kind: FailureKind,
    /// Human-readable cause
    pub cause: String,
}

impl PurgeFailure {
    /// Build a failure record from an error
    pub fn from_error(kind: FailureKind, error: &HistoryError) -> Self {
        Self {
            path: error.path().cloned(),
            kind,
            cause: error.to_string(),
        }
    }
}

/// Outcome of one purge run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PurgeReport {
    /// Files found below the storage root
    pub files_scanned: usize,
    /// Lineages (original files) found
    pub lineages: usize,
    /// Revisions falling outside the retention window
    pub files_expired: usize,
    /// Revisions actually deleted
    pub files_deleted: usize,
    /// Directories removed after deletion
    pub dirs_removed: usize,
    /// Files left alone because they are not revisions
    pub skipped: Vec<PathBuf>,
    /// Everything that failed
    pub failures: Vec<PurgeFailure>,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Whether the run only evaluated the policy
    pub dry_run: bool,
}

impl PurgeReport {
    /// Whether the run finished without any failure
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of failures of one kind
    pub fn failure_count(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }
}

/// Contents of a revision store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of revision files
    pub revisions: usize,
    /// Number of lineages
    pub lineages: usize,
    /// Total size of revision files in bytes
    pub total_bytes: u64,
    /// Files that do not follow the naming convention
    pub foreign_files: usize,
    /// Directories below the root
    pub directories: usize,
}
