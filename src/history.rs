//! Revision store: the writing and listing side of the store
//!
//! The purge engine only consumes the store. [`RevisionStore`] is what
//! produces and browses it: it decides where the revision of a file lives
//! (the original's directory mirrored below the root, see
//! [`naming::mirror_dir`]), writes snapshots there, and lists the revisions of
//! one original file. Deciding *when* to snapshot and whether a file is small
//! enough stays with the caller.
//!
//! ## Example
//!
//! ```rust,no_run
//! use chrono::Local;
//! use local_history::RevisionStore;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RevisionStore::new("/home/me/.local-history");
//! let original = Path::new("/home/me/project/src/app.js");
//!
//! store
//!     .save_revision(original, b"console.log(1)", Local::now().naive_local())
//!     .await?;
//!
//! for revision in store.list_revisions(original)? {
//!     println!("{}", revision.display());
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{HistoryError, Result};
use crate::lineage;
use crate::naming;
use crate::types::StoreStats;
use chrono::NaiveDateTime;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

/// Handle on a revision store rooted at one directory
#[derive(Debug, Clone)]
pub struct RevisionStore {
    root: PathBuf,
}

impl RevisionStore {
    /// Store rooted at `root`; nothing is created until a revision is saved
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the revisions of `original`
    pub fn lineage_dir(&self, original: &Path) -> PathBuf {
        let parent = original.parent().unwrap_or_else(|| Path::new(""));
        self.root.join(naming::mirror_dir(parent))
    }

    /// Path of the revision of `original` taken at `timestamp`
    pub fn revision_path(&self, original: &Path, timestamp: NaiveDateTime) -> Result<PathBuf> {
        let basename = original
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| HistoryError::internal(format!(
                "Cannot snapshot {:?}: no UTF-8 file name",
                original
            )))?;

        let name = naming::encode(timestamp, basename)?;
        Ok(self.lineage_dir(original).join(name))
    }

    /// Write a snapshot of `original` with `contents`, taken at `timestamp`
    ///
    /// Missing directories are created. A second snapshot within the same
    /// second replaces the first.
    pub async fn save_revision(
        &self,
        original: &Path,
        contents: &[u8],
        timestamp: NaiveDateTime,
    ) -> Result<PathBuf> {
        let path = self.revision_path(original, timestamp)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, contents).await?;
        debug!("Saved revision {:?}", path);
        Ok(path)
    }

    /// Revisions of `original`, newest first
    ///
    /// Only the mirrored directory of `original` is looked at, so a file with
    /// the same basename in a sub-directory is a different lineage and is not
    /// listed. A missing directory means no revisions.
    pub fn list_revisions(&self, original: &Path) -> Result<Vec<PathBuf>> {
        let dir = self.lineage_dir(original);
        let basename = match original.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return Ok(Vec::new()),
        };

        let mut revisions = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound) => {
                    break;
                }
                Err(e) => return Err(io::Error::from(e).into()),
            };

            if !entry.file_type().is_file() {
                continue;
            }
            match naming::decode(entry.path()) {
                Ok(name) if name.original == basename => revisions.push(entry.into_path()),
                Ok(_) => {}
                Err(_) => trace!("Ignoring {:?} while listing revisions", entry.path()),
            }
        }

        // Names share one basename, so name order is time order
        revisions.sort();
        revisions.reverse();
        Ok(revisions)
    }

    /// Count what the store holds
    pub fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats::default();
        if !self.root.exists() {
            return Ok(stats);
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry while counting: {}", e);
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                stats.directories += 1;
            } else if entry.file_type().is_file() {
                if naming::is_revision_name(&entry.file_name().to_string_lossy()) {
                    stats.total_bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
                }
                files.push(entry.into_path());
            }
        }

        let grouping = lineage::group(&self.root, &files);
        stats.revisions = grouping.index.revision_count();
        stats.lineages = grouping.index.len();
        stats.foreign_files = grouping.skipped.len();
        Ok(stats)
    }
}
