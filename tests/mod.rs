//! Main test module for local-history
//!
//! This module includes all test suites:
//! - Integration tests for randomized stores and whole-run behavior
//! - Property-based tests for naming and retention invariants
//! - Edge cases of the on-disk layout

pub mod integration;
pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::local_history::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 30, 0)
            .unwrap()
    }

    fn purger(root: &Path, days: i64) -> (Purger, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let purger = PurgerBuilder::new()
            .storage_path(root)
            .days_limit(days)
            .sink(sink.clone())
            .build()
            .unwrap();
        (purger, sink)
    }

    #[tokio::test]
    async fn test_malformed_names_are_never_touched() {
        let storage_dir = TempDir::new().unwrap();
        let dir = storage_dir.path().join("project");
        fs::create_dir_all(&dir).unwrap();

        let foreign = [
            "notes.txt",
            "2024-03-01_10-00-00_",
            "2024-03-01_10-00-00-app.js",
            "2024-03-0x_10-00-00_app.js",
            "2024-13-01_10-00-00_app.js",
            ".DS_Store",
        ];
        for name in foreign {
            fs::write(dir.join(name), b"keep me").unwrap();
        }

        let (purger, sink) = purger(storage_dir.path(), 0);
        let report = purger.run().await.unwrap();

        assert_eq!(report.files_scanned, foreign.len());
        assert_eq!(report.skipped.len(), foreign.len());
        assert_eq!(report.files_deleted, 0);
        assert_eq!(report.dirs_removed, 0);
        for name in foreign {
            assert!(dir.join(name).exists(), "{} was deleted", name);
        }
        assert!(sink.errors().is_empty());
    }

    #[tokio::test]
    async fn test_same_basename_in_sibling_directories() {
        let storage_dir = TempDir::new().unwrap();
        let store = RevisionStore::new(storage_dir.path());
        let a = Path::new("/work/a/config.json");
        let b = Path::new("/work/b/config.json");

        // a has three days, b only one
        store.save_revision(a, b"1", at(1, 9)).await.unwrap();
        store.save_revision(a, b"2", at(2, 9)).await.unwrap();
        store.save_revision(a, b"3", at(3, 9)).await.unwrap();
        store.save_revision(b, b"1", at(1, 9)).await.unwrap();

        let (purger, _) = purger(storage_dir.path(), 1);
        let report = purger.run().await.unwrap();

        assert_eq!(report.lineages, 2);
        assert_eq!(report.files_deleted, 2);
        assert_eq!(store.list_revisions(a).unwrap().len(), 1);
        assert_eq!(store.list_revisions(b).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lineage_at_the_limit_is_untouched() {
        let storage_dir = TempDir::new().unwrap();
        let store = RevisionStore::new(storage_dir.path());
        let file = Path::new("/work/main.rs");

        for day in 1..=3 {
            store.save_revision(file, b"x", at(day, 8)).await.unwrap();
            store.save_revision(file, b"y", at(day, 18)).await.unwrap();
        }

        let (purger, _) = purger(storage_dir.path(), 3);
        let report = purger.run().await.unwrap();
        assert_eq!(report.files_expired, 0);
        assert_eq!(report.files_deleted, 0);
        assert_eq!(store.list_revisions(file).unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_busy_day_is_kept_whole() {
        let storage_dir = TempDir::new().unwrap();
        let store = RevisionStore::new(storage_dir.path());
        let file = Path::new("/work/lib.rs");

        store.save_revision(file, b"old", at(1, 9)).await.unwrap();
        for hour in 0..10 {
            store.save_revision(file, b"busy", at(5, hour)).await.unwrap();
        }

        let (purger, _) = purger(storage_dir.path(), 1);
        let report = purger.run().await.unwrap();
        assert_eq!(report.files_deleted, 1);

        let left = store.list_revisions(file).unwrap();
        assert_eq!(left.len(), 10);
        assert!(left
            .iter()
            .all(|p| p.file_name().unwrap().to_string_lossy().starts_with("2024-03-05")));
    }

    #[tokio::test]
    async fn test_directories_with_foreign_files_survive() {
        let storage_dir = TempDir::new().unwrap();
        let store = RevisionStore::new(storage_dir.path());
        let file = Path::new("/work/deep/tree/file.txt");

        let revision = store.save_revision(file, b"x", at(1, 9)).await.unwrap();
        let keep = storage_dir.path().join("work").join("keep.txt");
        fs::write(&keep, b"foreign").unwrap();

        let (purger, _) = purger(storage_dir.path(), 0);
        let report = purger.run().await.unwrap();

        assert_eq!(report.files_deleted, 1);
        // deep/tree and deep go, work holds keep.txt
        assert_eq!(report.dirs_removed, 2);
        assert!(!revision.exists());
        assert!(keep.exists());
        assert!(storage_dir.path().exists());
    }

    #[tokio::test]
    async fn test_pre_existing_empty_directories_are_collected() {
        let storage_dir = TempDir::new().unwrap();
        fs::create_dir_all(storage_dir.path().join("empty/nested")).unwrap();

        let (purger, _) = purger(storage_dir.path(), 30);
        let report = purger.run().await.unwrap();
        assert_eq!(report.files_deleted, 0);
        assert_eq!(report.dirs_removed, 2);
        assert!(storage_dir.path().exists());
    }

    #[tokio::test]
    async fn test_negative_limit_aborts_before_io() {
        let storage_dir = TempDir::new().unwrap();
        let store = RevisionStore::new(storage_dir.path());
        let revision = store
            .save_revision(Path::new("/w/f.txt"), b"x", at(1, 9))
            .await
            .unwrap();

        let (purger, sink) = purger(storage_dir.path(), -1);
        let err = purger.run().await.unwrap_err();
        assert!(matches!(err, HistoryError::Policy(_)));
        assert!(revision.exists());

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], PurgeEvent::Error { path: None, .. }));
    }

    #[tokio::test]
    async fn test_special_filenames() {
        let storage_dir = TempDir::new().unwrap();
        let store = RevisionStore::new(storage_dir.path());

        let special_names = [
            "file with spaces.txt",
            "file_with_underscores.txt",
            "2024-01-01_00-00-00_looks_like_a_revision.txt",
            "Ünïcödé.md",
            "no-extension",
        ];
        for name in special_names {
            let original = Path::new("/w").join(name);
            store.save_revision(&original, b"a", at(1, 9)).await.unwrap();
            store.save_revision(&original, b"b", at(2, 9)).await.unwrap();
        }

        let (purger, _) = purger(storage_dir.path(), 1);
        let report = purger.run().await.unwrap();
        assert_eq!(report.lineages, special_names.len());
        assert_eq!(report.files_deleted, special_names.len());
        assert!(report.skipped.is_empty());

        for name in special_names {
            let left = store.list_revisions(&Path::new("/w").join(name)).unwrap();
            assert_eq!(left.len(), 1, "{}", name);
        }
    }

    #[tokio::test]
    async fn test_missing_root_is_an_empty_store() {
        let storage_dir = TempDir::new().unwrap();
        let (purger, sink) = purger(&storage_dir.path().join("never-created"), 5);

        let report = purger.run().await.unwrap();
        assert_eq!(report.files_scanned, 0);
        assert_eq!(report.files_deleted, 0);
        assert!(report.is_clean());
        assert!(sink.errors().is_empty());
    }
}
