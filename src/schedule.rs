//! Daily cadence for automatic purges
//!
//! When automatic purging is enabled, a purge runs at most once per day. The
//! time of the last automatic purge is kept in a small JSON stamp file next
//! to the storage root (never inside it, so the purge never sees it).

use crate::error::Result;
use crate::purge::Purger;
use crate::types::PurgeReport;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Minimum time between two automatic purges
pub const PURGE_INTERVAL_SECS: i64 = 86_400;

#[derive(Debug, Serialize, Deserialize)]
struct StampFile {
    last_purge: DateTime<Utc>,
}

/// Persistent record of the last automatic purge
#[derive(Debug, Clone)]
pub struct PurgeStamp {
    path: PathBuf,
}

impl PurgeStamp {
    /// Stamp stored at an explicit location
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Stamp stored beside `storage_root`, as `<root name>.last-purge.json`
    pub fn for_storage_root(storage_root: &Path) -> Self {
        let name = storage_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "local-history".to_string());
        let parent = storage_root.parent().unwrap_or_else(|| Path::new("."));
        Self::new(parent.join(format!("{}.last-purge.json", name)))
    }

    /// Location of the stamp file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Time of the last recorded purge
    ///
    /// A missing or unreadable stamp counts as "never".
    pub fn last_purge(&self) -> Option<DateTime<Utc>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Cannot read purge stamp {:?}: {}", self.path, e);
                return None;
            }
        };

        match serde_json::from_str::<StampFile>(&content) {
            Ok(stamp) => Some(stamp.last_purge),
            Err(e) => {
                warn!("Ignoring corrupt purge stamp {:?}: {}", self.path, e);
                None
            }
        }
    }

    /// Whether an automatic purge is due at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_purge() {
            Some(last) => now - last > Duration::seconds(PURGE_INTERVAL_SECS),
            None => true,
        }
    }

    /// Record a purge at `now`
    pub fn record(&self, now: DateTime<Utc>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(&StampFile { last_purge: now })?;
        fs::write(&self.path, content)?;
        debug!("Recorded purge at {} in {:?}", now, self.path);
        Ok(())
    }
}

/// Run `purger` if automatic purging is enabled and the last automatic purge
/// is more than a day old
///
/// The stamp is written before the run starts, so a failing store is not
/// hammered on every start-up. Returns `None` when no purge ran; with
/// automatic purging disabled the stamp is not even read.
pub async fn purge_if_due(
    purger: &Purger,
    stamp: &PurgeStamp,
    now: DateTime<Utc>,
) -> Result<Option<PurgeReport>> {
    if !purger.auto_purge() {
        debug!("Automatic purge disabled for {:?}", purger.root());
        return Ok(None);
    }
    if !stamp.is_due(now) {
        debug!("Automatic purge not due yet");
        return Ok(None);
    }

    stamp.record(now)?;
    purger.run().await.map(Some)
}
