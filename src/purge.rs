//! Purge orchestration
//!
//! [`Purger`] is the entry point of the retention engine. One run:
//!
//! 1. validates the retention policy (a bad policy aborts before any I/O),
//! 2. scans the storage root,
//! 3. groups the files found into lineages,
//! 4. deletes the revisions outside the retention window,
//! 5. removes directories left empty,
//!
//! and returns a [`PurgeReport`]. Each phase starts only after the previous
//! one has completely finished, so no directory is removed while deletions
//! inside it are still pending. Runs against one storage root are
//! serialized: every `Purger` built for the same root in a process shares one
//! run guard, and with [`PurgerBuilder::process_lock`] runs in other
//! processes are waited for as well.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use local_history::Purger;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let purger = Purger::builder()
//!     .storage_path("/home/me/.local-history")
//!     .days_limit(14)
//!     .build()?;
//!
//! let report = purger.run().await?;
//! println!(
//!     "{} revisions deleted, {} directories removed",
//!     report.files_deleted, report.dirs_removed
//! );
//! # Ok(())
//! # }
//! ```

use crate::collector;
use crate::config::HistoryConfig;
use crate::error::{HistoryError, Result};
use crate::events::{LogSink, PurgeEvent, PurgeSink};
use crate::lineage;
use crate::lock;
use crate::retention::{self, DeleteOptions, RetentionPolicy};
use crate::scanner;
use crate::types::{FailureKind, PurgeFailure, PurgeReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// Retention engine bound to one storage root
#[derive(Clone)]
pub struct Purger {
    root: PathBuf,
    days_limit: i64,
    max_concurrent_deletes: usize,
    sink: Arc<dyn PurgeSink>,
    auto_purge: bool,
    process_lock: bool,
    run_guard: Arc<Mutex<()>>,
}

impl std::fmt::Debug for Purger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Purger")
            .field("root", &self.root)
            .field("days_limit", &self.days_limit)
            .field("max_concurrent_deletes", &self.max_concurrent_deletes)
            .field("sink", &"<sink>")
            .field("auto_purge", &self.auto_purge)
            .field("process_lock", &self.process_lock)
            .finish()
    }
}

impl Purger {
    /// Create a purger from configuration, reporting to `tracing`
    pub fn new(config: &HistoryConfig) -> Result<Self> {
        PurgerBuilder::from_config(config.clone()).build()
    }

    /// Start building a purger with default configuration
    pub fn builder() -> PurgerBuilder {
        PurgerBuilder::new()
    }

    /// Storage root this purger works on
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Configured day limit, as given
    pub fn days_limit(&self) -> i64 {
        self.days_limit
    }

    /// Whether the daily automatic purge is enabled for this store
    pub fn auto_purge(&self) -> bool {
        self.auto_purge
    }

    /// Run a purge: delete expired revisions, then emptied directories
    ///
    /// # Errors
    ///
    /// Only [`HistoryError::Policy`]; every other failure is recorded in the
    /// report and sent to the sink.
    #[instrument(skip(self), fields(root = ?self.root))]
    pub async fn run(&self) -> Result<PurgeReport> {
        self.execute(false).await
    }

    /// Evaluate the policy without deleting anything (dry run)
    #[instrument(skip(self), fields(root = ?self.root))]
    pub async fn analyze(&self) -> Result<PurgeReport> {
        self.execute(true).await
    }

    async fn execute(&self, dry_run: bool) -> Result<PurgeReport> {
        let policy = match RetentionPolicy::new(self.days_limit) {
            Ok(policy) => policy,
            Err(e) => {
                self.report(&e);
                return Err(e);
            }
        };

        let _guard = self.run_guard.lock().await;
        let _store_lock = if self.process_lock {
            lock::acquire_or_warn(&self.root).await
        } else {
            None
        };
        let start = Instant::now();

        if dry_run {
            info!("Analyzing purge of {:?} (dry run)", self.root);
        } else {
            self.sink.on_event(&PurgeEvent::Started {
                root: self.root.clone(),
            });
        }

        let scan = scanner::scan(&self.root).await;
        let mut report = PurgeReport {
            files_scanned: scan.files.len(),
            dry_run,
            ..Default::default()
        };
        for err in &scan.errors {
            self.report(err);
            report
                .failures
                .push(PurgeFailure::from_error(FailureKind::Scan, err));
        }

        let grouping = lineage::group(&self.root, &scan.files);
        report.lineages = grouping.index.len();
        report.skipped = grouping.skipped;

        if dry_run {
            report.files_expired = policy.expired_revisions(&grouping.index).len();
        } else {
            let options = DeleteOptions {
                root: self.root.clone(),
                max_concurrent: self.max_concurrent_deletes,
                sink: Arc::clone(&self.sink),
            };
            let deletion = retention::evaluate_and_delete(&grouping.index, &policy, &options).await;
            report.files_expired = deletion.files_expired;
            report.files_deleted = deletion.files_deleted;
            report.failures.extend(deletion.failures);

            debug!("Deletions settled, collecting empty directories");
            let collected = collector::remove_if_empty(scan.directories, self.sink.as_ref()).await;
            report.dirs_removed = collected.removed;
            report.failures.extend(
                collected
                    .failures
                    .iter()
                    .map(|e| PurgeFailure::from_error(FailureKind::DirRemove, e)),
            );
        }

        report.duration_ms = start.elapsed().as_millis() as u64;

        if dry_run {
            info!(
                "Purge analysis complete in {}ms: {} of {} files would be deleted",
                report.duration_ms, report.files_expired, report.files_scanned
            );
        } else {
            self.sink.on_event(&PurgeEvent::Finished {
                files_deleted: report.files_deleted,
                dirs_removed: report.dirs_removed,
            });
            info!(
                "Purge complete in {}ms: {} files deleted, {} directories removed, {} failures",
                report.duration_ms,
                report.files_deleted,
                report.dirs_removed,
                report.failures.len()
            );
        }

        Ok(report)
    }

    fn report(&self, err: &HistoryError) {
        self.sink.on_event(&PurgeEvent::Error {
            path: err.path().cloned(),
            cause: err.to_string(),
        });
    }
}

/// Builder for [`Purger`]
///
/// # Examples
///
/// ```rust
/// use local_history::events::NoOpSink;
/// use local_history::PurgerBuilder;
/// use std::sync::Arc;
///
/// let purger = PurgerBuilder::new()
///     .storage_path("/tmp/local-history")
///     .days_limit(7)
///     .max_concurrent_deletes(16)
///     .sink(Arc::new(NoOpSink))
///     .build()
///     .unwrap();
/// assert_eq!(purger.days_limit(), 7);
/// ```
pub struct PurgerBuilder {
    config: HistoryConfig,
    sink: Arc<dyn PurgeSink>,
    process_lock: bool,
}

impl std::fmt::Debug for PurgerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PurgerBuilder")
            .field("config", &self.config)
            .field("sink", &"<sink>")
            .field("process_lock", &self.process_lock)
            .finish()
    }
}

impl Default for PurgerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PurgerBuilder {
    /// Builder with default configuration and a [`LogSink`]
    pub fn new() -> Self {
        Self::from_config(HistoryConfig::default())
    }

    /// Builder starting from an existing configuration
    pub fn from_config(config: HistoryConfig) -> Self {
        Self {
            config,
            sink: Arc::new(LogSink),
            process_lock: false,
        }
    }

    /// Set the storage root
    pub fn storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage_path = path.into();
        self
    }

    /// Set the number of days kept per original file
    pub fn days_limit(mut self, days: i64) -> Self {
        self.config.days_limit = days;
        self
    }

    /// Set the maximum number of deletions in flight
    pub fn max_concurrent_deletes(mut self, limit: usize) -> Self {
        self.config.max_concurrent_deletes = limit;
        self
    }

    /// Enable or disable the daily automatic purge
    pub fn auto_purge(mut self, enabled: bool) -> Self {
        self.config.auto_purge = enabled;
        self
    }

    /// Set the event sink
    pub fn sink(mut self, sink: Arc<dyn PurgeSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Also hold an advisory lock file beside the storage root while running
    ///
    /// Needed when several processes may purge the same store, as with the
    /// command line tool. The lock file is `<root>.purge.lock`.
    pub fn process_lock(mut self, enabled: bool) -> Self {
        self.process_lock = enabled;
        self
    }

    /// Build the purger
    ///
    /// The day limit is validated when a run starts, not here.
    pub fn build(self) -> Result<Purger> {
        self.config.validate()?;
        let run_guard = lock::run_guard(&self.config.storage_path);
        Ok(Purger {
            root: self.config.storage_path,
            days_limit: self.config.days_limit,
            max_concurrent_deletes: self.config.max_concurrent_deletes,
            sink: self.sink,
            auto_purge: self.config.auto_purge,
            process_lock: self.process_lock,
            run_guard,
        })
    }
}

/// Purge the store described by `config`, reporting to `tracing`
pub async fn purge(config: &HistoryConfig) -> Result<PurgeReport> {
    Purger::new(config)?.run().await
}
