//! Day-bucketed retention and deletion of expired revisions
//!
//! Retention counts calendar days of activity, not revisions: a lineage keeps
//! every revision from its `days_limit` most recent days with at least one
//! revision, however many revisions those days hold, and everything older is
//! expired. A file saved fifty times today and once a day last month keeps
//! "the last N days it was worked on".
//!
//! Deletions are independent of each other. They run concurrently with a
//! bounded fan-out, each task returns its own result, and the results are
//! reduced once every task has been joined.

use crate::error::{HistoryError, Result};
use crate::events::{PurgeEvent, PurgeSink};
use crate::lineage::{DayBuckets, RevisionIndex};
use crate::types::{FailureKind, PurgeFailure, PurgeReport};
use crate::utils;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

/// Number of most recent days of revisions kept per original file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    days_limit: usize,
}

impl RetentionPolicy {
    /// Build a policy from a configured day count
    ///
    /// # Errors
    ///
    /// [`HistoryError::Policy`] if `days_limit` is negative.
    pub fn new(days_limit: i64) -> Result<Self> {
        let days_limit = usize::try_from(days_limit).map_err(|_| {
            HistoryError::policy(format!("days_limit must not be negative (got {})", days_limit))
        })?;
        Ok(Self { days_limit })
    }

    /// Days kept per lineage; 0 keeps nothing
    pub fn days_limit(&self) -> usize {
        self.days_limit
    }

    /// Expired buckets of one lineage, oldest first
    pub fn expired<'a>(
        &self,
        days: &'a DayBuckets,
    ) -> impl Iterator<Item = &'a Vec<PathBuf>> + 'a {
        let excess = days.len().saturating_sub(self.days_limit);
        days.values().take(excess)
    }

    /// Every expired revision in `index`
    pub fn expired_revisions(&self, index: &RevisionIndex) -> Vec<PathBuf> {
        let mut expired = Vec::new();
        for (key, days) in index.iter() {
            let before = expired.len();
            for bucket in self.expired(days) {
                expired.extend(bucket.iter().cloned());
            }
            if expired.len() > before {
                trace!("{}: {} revisions expired", key, expired.len() - before);
            }
        }
        expired
    }
}

/// Deletion settings for one run
#[derive(Clone)]
pub struct DeleteOptions {
    /// Storage root; nothing outside it is deleted
    pub root: PathBuf,
    /// Maximum number of deletions in flight
    pub max_concurrent: usize,
    /// Receiver of per-file failures
    pub sink: Arc<dyn PurgeSink>,
}

impl std::fmt::Debug for DeleteOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeleteOptions")
            .field("root", &self.root)
            .field("max_concurrent", &self.max_concurrent)
            .field("sink", &"<sink>")
            .finish()
    }
}

/// Apply `policy` to every lineage of `index` and delete the expired revisions
///
/// The returned report carries `files_expired`, `files_deleted` and the
/// delete failures; every failure has also been sent to the sink by the time
/// this returns.
pub async fn evaluate_and_delete(
    index: &RevisionIndex,
    policy: &RetentionPolicy,
    options: &DeleteOptions,
) -> PurgeReport {
    let expired = policy.expired_revisions(index);
    debug!(
        "{} of {} revisions expired (days_limit = {})",
        expired.len(),
        index.revision_count(),
        policy.days_limit()
    );

    let mut report = PurgeReport {
        files_expired: expired.len(),
        ..Default::default()
    };

    let outcomes = delete_files(expired, options).await;
    for outcome in outcomes {
        match outcome {
            Ok(true) => report.files_deleted += 1,
            Ok(false) => {}
            Err(e) => report
                .failures
                .push(PurgeFailure::from_error(FailureKind::Delete, &e)),
        }
    }

    report
}

/// Delete `paths` concurrently, reporting failures to the sink as they occur
///
/// Each outcome is `Ok(true)` when the file was removed, `Ok(false)` when it
/// was already gone, or the error that prevented its removal.
pub async fn delete_files(paths: Vec<PathBuf>, options: &DeleteOptions) -> Vec<Result<bool>> {
    let semaphore = Arc::new(Semaphore::new(options.max_concurrent.max(1)));
    let mut tasks = JoinSet::new();
    let mut outcomes = Vec::with_capacity(paths.len());

    for path in paths {
        if !utils::is_within(&path, &options.root) {
            let err = HistoryError::OutsideStorageRoot { path };
            report_error(options.sink.as_ref(), &err);
            outcomes.push(Err(err));
            continue;
        }

        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| HistoryError::internal(format!("deletion limiter closed: {}", e)))?;
            remove_revision(&path).await
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let outcome = joined.unwrap_or_else(|e| {
            Err(HistoryError::internal(format!("deletion task failed: {}", e)))
        });
        if let Err(ref err) = outcome {
            report_error(options.sink.as_ref(), err);
        }
        outcomes.push(outcome);
    }

    outcomes
}

async fn remove_revision(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => {
            trace!("Deleted expired revision {:?}", path);
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Expired revision {:?} already gone", path);
            Ok(false)
        }
        Err(source) => Err(HistoryError::Delete {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn report_error(sink: &dyn PurgeSink, err: &HistoryError) {
    warn!("{}", err);
    sink.on_event(&PurgeEvent::Error {
        path: err.path().cloned(),
        cause: err.to_string(),
    });
}
