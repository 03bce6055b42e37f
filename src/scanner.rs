//! Asynchronous recursive directory scanning
//!
//! The scanner walks the revision store and reports every regular file and
//! every directory below the root. Each directory is read by its own task on
//! a [`JoinSet`], so sibling subtrees are read concurrently and a failure in
//! one of them only costs that subtree. Symbolic links are neither reported
//! nor followed, which keeps the purge confined to the storage root.

use crate::error::HistoryError;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

/// Everything found below a scanned root
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Regular files, in no particular order
    pub files: Vec<PathBuf>,
    /// Directories below the root (the root itself excluded), in no particular order
    pub directories: Vec<PathBuf>,
    /// Entries or subtrees that could not be read
    pub errors: Vec<HistoryError>,
}

impl ScanResult {
    /// Whether nothing at all was found
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.directories.is_empty()
    }
}

/// Contents of a single directory
#[derive(Debug, Default)]
struct DirListing {
    files: Vec<PathBuf>,
    directories: Vec<PathBuf>,
    errors: Vec<HistoryError>,
}

/// Recursively scan `root`
///
/// A missing root is an empty store and yields an empty result. Errors on
/// individual entries are collected in [`ScanResult::errors`] and never stop
/// the scan of other subtrees.
pub async fn scan(root: &Path) -> ScanResult {
    let mut result = ScanResult::default();

    match fs::metadata(root).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            result.errors.push(HistoryError::Scan {
                path: root.to_path_buf(),
                source: io::Error::other("storage root is not a directory"),
            });
            return result;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Storage root {:?} does not exist, nothing to scan", root);
            return result;
        }
        Err(source) => {
            result.errors.push(HistoryError::Scan {
                path: root.to_path_buf(),
                source,
            });
            return result;
        }
    }

    let mut pending = JoinSet::new();
    pending.spawn(read_directory(root.to_path_buf()));

    while let Some(joined) = pending.join_next().await {
        let listing = match joined {
            Ok(listing) => listing,
            Err(e) => {
                warn!("Directory read task failed: {}", e);
                result
                    .errors
                    .push(HistoryError::internal(format!("directory read task failed: {}", e)));
                continue;
            }
        };

        for dir in listing.directories {
            pending.spawn(read_directory(dir.clone()));
            result.directories.push(dir);
        }
        result.files.extend(listing.files);
        result.errors.extend(listing.errors);
    }

    debug!(
        "Scanned {:?}: {} files, {} directories, {} errors",
        root,
        result.files.len(),
        result.directories.len(),
        result.errors.len()
    );

    result
}

async fn read_directory(dir: PathBuf) -> DirListing {
    let mut listing = DirListing::default();

    let mut entries = match fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(source) => {
            warn!("Cannot read directory {:?}: {}", dir, source);
            listing.errors.push(HistoryError::Scan { path: dir, source });
            return listing;
        }
    };

    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                match entry.file_type().await {
                    Ok(file_type) if file_type.is_dir() => listing.directories.push(path),
                    Ok(file_type) if file_type.is_file() => listing.files.push(path),
                    Ok(_) => trace!("Skipping non-regular entry {:?}", path),
                    Err(source) => {
                        warn!("Cannot stat {:?}: {}", path, source);
                        listing.errors.push(HistoryError::Scan { path, source });
                    }
                }
            }
            Ok(None) => break,
            Err(source) => {
                warn!("Error while listing {:?}: {}", dir, source);
                listing.errors.push(HistoryError::Scan {
                    path: dir.clone(),
                    source,
                });
                break;
            }
        }
    }

    listing
}
