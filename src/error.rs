//! Error types for the local-history library
//!
//! This module defines every error that can occur while scanning, grouping,
//! purging or writing revisions. Most of them are recovered locally by the
//! purge run (a bad file name is skipped, a failed deletion is recorded and
//! the run continues); only a malformed retention policy aborts a run.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the local-history library
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Main error type for all local-history operations
#[derive(Debug, Error)]
pub enum HistoryError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A path in the store does not follow the revision naming convention
    #[error("Malformed revision name: {path:?}")]
    MalformedName {
        /// Offending path
        path: PathBuf,
    },

    /// A directory entry could not be read or statted during a scan
    #[error("Scan error at {path:?}: {source}")]
    Scan {
        /// Entry that could not be read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A revision file could not be deleted
    #[error("Cannot delete revision {path:?}: {source}")]
    Delete {
        /// Revision file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A directory could not be removed for a reason other than being non-empty
    #[error("Cannot remove directory {path:?}: {source}")]
    DirRemove {
        /// Directory path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Deletion target lies outside the storage root
    #[error("Refusing to touch {path:?}: outside of the storage root")]
    OutsideStorageRoot {
        /// Rejected path
        path: PathBuf,
    },

    /// Timestamp cannot be written as a fixed-width revision prefix
    #[error("Timestamp {timestamp} is outside the years 0000-9999")]
    TimestampOutOfRange {
        /// Rejected timestamp
        timestamp: chrono::NaiveDateTime,
    },

    /// Retention policy is unusable; the run is aborted before any deletion
    #[error("Invalid retention policy: {0}")]
    Policy(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// File too large for configured limits
    #[error("File too large: {path:?} ({size} bytes, limit is {limit} bytes)")]
    FileTooLarge {
        /// Path to the file
        path: PathBuf,
        /// Actual file size
        size: u64,
        /// Configured size limit
        limit: u64,
    },

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HistoryError {
    /// Create a policy error with a custom message
    pub fn policy(msg: impl Into<String>) -> Self {
        HistoryError::Policy(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        HistoryError::Internal(msg.into())
    }

    /// Check if the purge run can carry on after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HistoryError::MalformedName { .. }
                | HistoryError::Scan { .. }
                | HistoryError::Delete { .. }
                | HistoryError::DirRemove { .. }
                | HistoryError::OutsideStorageRoot { .. }
        )
    }

    /// Check if this error aborts a purge run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HistoryError::Policy(_) | HistoryError::InvalidConfiguration(_)
        )
    }

    /// Path the error refers to, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            HistoryError::MalformedName { path }
            | HistoryError::Scan { path, .. }
            | HistoryError::Delete { path, .. }
            | HistoryError::DirRemove { path, .. }
            | HistoryError::OutsideStorageRoot { path }
            | HistoryError::FileTooLarge { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            HistoryError::Policy(msg) => {
                format!("{}. Set 'days_limit' to 0 or a positive number of days.", msg)
            }
            HistoryError::Delete { path, .. } | HistoryError::DirRemove { path, .. } => {
                format!(
                    "{}. Check the permissions of {:?} and run the purge again.",
                    self, path
                )
            }
            HistoryError::FileTooLarge { path, size, limit } => {
                format!(
                    "File {:?} is too large ({} bytes). Only files smaller than {} bytes \
                     are saved. Raise 'file_size_limit' to keep revisions of it.",
                    path, size, limit
                )
            }
            _ => self.to_string(),
        }
    }
}
