//! Serialization of purge runs per storage root
//!
//! Two layers keep purges of one store from overlapping:
//!
//! - inside a process, every [`Purger`](crate::Purger) built for the same root
//!   shares one async guard from a process-wide registry, so independently
//!   built purgers wait for each other just like clones do
//! - across processes, a purge can additionally hold an advisory `flock` on a
//!   lock file next to the storage root (never inside it, so the scan never
//!   sees it)

use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Weak};
use tracing::{debug, warn};

type RunGuard = tokio::sync::Mutex<()>;

static RUN_GUARDS: LazyLock<Mutex<HashMap<PathBuf, Weak<RunGuard>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Async guard shared by every purger of `root` in this process
///
/// Entries whose guards are no longer held by any purger are pruned on the
/// way.
pub(crate) fn run_guard(root: &Path) -> Arc<RunGuard> {
    let key = guard_key(root);
    let mut guards = RUN_GUARDS.lock();
    guards.retain(|_, guard| guard.strong_count() > 0);

    if let Some(guard) = guards.get(&key).and_then(Weak::upgrade) {
        return guard;
    }
    let guard = Arc::new(RunGuard::new(()));
    guards.insert(key, Arc::downgrade(&guard));
    guard
}

fn guard_key(root: &Path) -> PathBuf {
    std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf())
}

/// Exclusive advisory lock on a storage root, held until dropped
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    // Dropping the handle releases the flock
    _file: File,
}

impl StoreLock {
    /// Lock file used for `storage_root`: `<root name>.purge.lock` beside it
    pub fn path_for(storage_root: &Path) -> PathBuf {
        let name = storage_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "local-history".to_string());
        let parent = storage_root.parent().unwrap_or_else(|| Path::new("."));
        parent.join(format!("{}.purge.lock", name))
    }

    /// Wait until no other process holds the lock of `storage_root`, then take it
    ///
    /// The blocking `flock` runs on tokio's blocking pool.
    pub async fn acquire(storage_root: &Path) -> std::io::Result<Self> {
        let path = Self::path_for(storage_root);
        tokio::task::spawn_blocking(move || Self::acquire_blocking(path))
            .await
            .map_err(std::io::Error::other)?
    }

    fn acquire_blocking(path: PathBuf) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        FileExt::lock_exclusive(&file)?;
        debug!("Acquired store lock {:?}", path);
        Ok(Self { path, _file: file })
    }

    /// Location of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Take the store lock, or log why the run goes ahead without it
pub(crate) async fn acquire_or_warn(storage_root: &Path) -> Option<StoreLock> {
    match StoreLock::acquire(storage_root).await {
        Ok(lock) => Some(lock),
        Err(e) => {
            warn!(
                "Purging {:?} without a cross-process lock: {}",
                storage_root, e
            );
            None
        }
    }
}
