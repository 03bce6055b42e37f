//! Integration tests for local-history
//!
//! Builds randomized revision stores and checks whole purge runs against a
//! model of what retention should leave behind.

use ::local_history::*;
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::info;

/// Test harness for randomized revision stores
pub struct StoreTestHarness {
    pub storage_dir: TempDir,
    pub store: RevisionStore,
    pub rng: StdRng,
    /// Originals and the days each one has revisions on
    pub model: BTreeMap<PathBuf, BTreeSet<NaiveDate>>,
}

/// Shape of a generated store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub directories: usize,
    pub files_per_dir: usize,
    pub max_days: u32,
    pub max_revisions_per_day: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directories: 4,
            files_per_dir: 5,
            max_days: 12,
            max_revisions_per_day: 4,
        }
    }
}

impl StoreTestHarness {
    /// Create a new test harness
    pub fn new(seed: u64) -> Self {
        let storage_dir = TempDir::new().unwrap();
        let store = RevisionStore::new(storage_dir.path());

        Self {
            storage_dir,
            store,
            rng: StdRng::seed_from_u64(seed),
            model: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        self.storage_dir.path()
    }

    /// Fill the store with random revisions
    pub async fn populate(&mut self, config: &StoreConfig) -> anyhow::Result<usize> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        // Two saves in the same second share a path
        let mut written = BTreeSet::new();

        for dir_idx in 0..config.directories {
            let depth = self.rng.random_range(1..=3);
            let mut dir = PathBuf::from("/home/dev");
            for level in 0..depth {
                dir = dir.join(format!("dir_{}_{}", level, dir_idx));
            }

            for file_idx in 0..config.files_per_dir {
                let original = dir.join(format!("file_{}.txt", file_idx));
                let days = self.rng.random_range(1..=config.max_days);

                for _ in 0..days {
                    let date = base + Duration::days(self.rng.random_range(0..60));
                    let revisions = self.rng.random_range(1..=config.max_revisions_per_day);
                    for _ in 0..revisions {
                        let time = date
                            .and_hms_opt(
                                self.rng.random_range(0..24),
                                self.rng.random_range(0..60),
                                self.rng.random_range(0..60),
                            )
                            .unwrap();
                        let content = format!("{} @ {}", original.display(), time);
                        let path = self
                            .store
                            .save_revision(&original, content.as_bytes(), time)
                            .await?;
                        written.insert(path);
                    }
                    self.model.entry(original.clone()).or_default().insert(date);
                }
            }
        }

        info!("Generated {} revisions for {} files", written.len(), self.model.len());
        Ok(written.len())
    }

    /// Days each original should still have after purging with `days_limit`
    pub fn expected_days(&self, days_limit: usize) -> BTreeMap<PathBuf, Vec<NaiveDate>> {
        self.model
            .iter()
            .map(|(original, days)| {
                let kept: Vec<_> = days.iter().rev().take(days_limit).rev().copied().collect();
                (original.clone(), kept)
            })
            .collect()
    }

    /// Days each original has on disk right now
    pub fn actual_days(&self) -> BTreeMap<PathBuf, Vec<NaiveDate>> {
        self.model
            .keys()
            .map(|original| {
                let days: BTreeSet<NaiveDate> = self
                    .store
                    .list_revisions(original)
                    .unwrap()
                    .iter()
                    .map(|p| naming::decode(p).unwrap().timestamp.date())
                    .collect();
                (original.clone(), days.into_iter().collect())
            })
            .collect()
    }

    pub fn purger(&self, days_limit: i64, sink: Arc<dyn PurgeSink>) -> Purger {
        PurgerBuilder::new()
            .storage_path(self.root())
            .days_limit(days_limit)
            .max_concurrent_deletes(8)
            .sink(sink)
            .build()
            .unwrap()
    }
}

fn revision_count(root: &Path) -> usize {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_random_store_matches_model() {
        for (seed, days_limit) in [(1u64, 1usize), (7, 3), (42, 5), (1337, 30)] {
            let mut harness = StoreTestHarness::new(seed);
            let written = harness.populate(&StoreConfig::default()).await.unwrap();
            assert_eq!(revision_count(harness.root()), written);

            let sink = Arc::new(MemorySink::new());
            let report = harness
                .purger(days_limit as i64, sink.clone())
                .run()
                .await
                .unwrap();

            assert!(report.is_clean(), "seed {}: {:?}", seed, report.failures);
            assert_eq!(report.files_scanned, written);
            assert_eq!(report.lineages, harness.model.len());
            assert_eq!(report.files_deleted, report.files_expired);
            assert_eq!(
                revision_count(harness.root()),
                written - report.files_deleted
            );
            assert_eq!(harness.actual_days(), harness.expected_days(days_limit));
            assert!(sink.errors().is_empty());
        }
    }

    #[tokio::test]
    async fn test_purge_is_idempotent() {
        let mut harness = StoreTestHarness::new(2024);
        harness.populate(&StoreConfig::default()).await.unwrap();

        let first = harness.purger(2, Arc::new(NoOpSink)).run().await.unwrap();
        assert!(first.files_deleted > 0);

        let second = harness.purger(2, Arc::new(NoOpSink)).run().await.unwrap();
        assert_eq!(second.files_expired, 0);
        assert_eq!(second.files_deleted, 0);
        assert_eq!(second.dirs_removed, 0);
        assert_eq!(second.files_scanned, first.files_scanned - first.files_deleted);
    }

    #[tokio::test]
    async fn test_dry_run_predicts_the_real_run() {
        let mut harness = StoreTestHarness::new(99);
        let written = harness.populate(&StoreConfig::default()).await.unwrap();

        let sink = Arc::new(MemorySink::new());
        let purger = harness.purger(4, sink.clone());

        let analysis = purger.analyze().await.unwrap();
        assert!(analysis.dry_run);
        assert_eq!(analysis.files_deleted, 0);
        assert_eq!(revision_count(harness.root()), written);
        assert!(sink.events().is_empty());

        let report = purger.run().await.unwrap();
        assert!(!report.dry_run);
        assert_eq!(report.files_deleted, analysis.files_expired);
    }

    #[tokio::test]
    async fn test_foreign_files_survive_random_purges() {
        let mut harness = StoreTestHarness::new(5);
        harness.populate(&StoreConfig::default()).await.unwrap();

        let foreign: Vec<PathBuf> = harness
            .model
            .keys()
            .take(3)
            .map(|original| harness.store.lineage_dir(original).join("README"))
            .collect();
        for path in &foreign {
            fs::write(path, b"not a revision").unwrap();
        }

        let report = harness.purger(0, Arc::new(NoOpSink)).run().await.unwrap();
        assert_eq!(report.skipped.len(), foreign.len());
        assert_eq!(revision_count(harness.root()), foreign.len());
        for path in &foreign {
            assert!(path.exists());
        }
    }

    #[tokio::test]
    async fn test_zero_days_empties_the_store() {
        let mut harness = StoreTestHarness::new(11);
        let written = harness.populate(&StoreConfig::default()).await.unwrap();

        let (sink, mut events) = ChannelSink::channel();
        let report = harness.purger(0, Arc::new(sink)).run().await.unwrap();

        assert_eq!(report.files_deleted, written);
        assert!(report.dirs_removed > 0);
        assert_eq!(fs::read_dir(harness.root()).unwrap().count(), 0);

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        assert!(matches!(received.first(), Some(PurgeEvent::Started { .. })));
        assert!(matches!(
            received.last(),
            Some(PurgeEvent::Finished { files_deleted, .. }) if *files_deleted == written
        ));
    }

    #[tokio::test]
    async fn test_concurrent_purgers_share_the_store() {
        let mut harness = StoreTestHarness::new(77);
        let written = harness.populate(&StoreConfig::default()).await.unwrap();

        let purger = harness.purger(1, Arc::new(NoOpSink));
        let other = purger.clone();
        let (a, b) = tokio::join!(purger.run(), other.run());
        let (a, b) = (a.unwrap(), b.unwrap());

        // Clones serialize, so the second run finds nothing left to delete
        assert_eq!(a.files_deleted + b.files_deleted, written - revision_count(harness.root()));
        assert!(a.files_deleted == 0 || b.files_deleted == 0);
        assert_eq!(harness.actual_days(), harness.expected_days(1));
    }
}
