//! Property-based testing for local-history
//!
//! Uses proptest to verify the naming and retention invariants across
//! randomly generated names, stores and limits.

use ::local_history::*;
use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use std::path::{Path, PathBuf};

/// Generate timestamps within the fixed-width year range
fn timestamp_strategy() -> impl Strategy<Value = NaiveDateTime> {
    (1i32..=9999, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60, 0u32..60).prop_map(
        |(y, mo, d, h, mi, s)| {
            NaiveDate::from_ymd_opt(y, mo, d)
                .unwrap()
                .and_hms_opt(h, mi, s)
                .unwrap()
        },
    )
}

/// Generate original basenames, including ones that look like revisions
fn basename_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9]{1,12}\\.(txt|rs|md|js)",
        "[a-z_ -]{1,16}",
        "\\.[a-z]{1,8}",
        "[0-9]{4}-[0-9]{2}-[0-9]{2}_[0-9]{2}-[0-9]{2}-[0-9]{2}_[a-z]{1,6}",
        "[α-ω]{1,6}\\.txt",
    ]
}

/// Generate relative store directories (0-3 levels)
fn dir_strategy() -> impl Strategy<Value = PathBuf> {
    prop::collection::vec("[a-z]{1,6}", 0..=3).prop_map(|parts| parts.iter().collect())
}

/// Generate a flat list of revision paths below `/store`
fn revisions_strategy() -> impl Strategy<Value = Vec<PathBuf>> {
    prop::collection::vec(
        (
            dir_strategy(),
            prop::sample::select(vec!["a.txt", "b.txt", "c_d.txt"]),
            0i64..20,
            0u32..86_400,
        ),
        0..60,
    )
    .prop_map(|entries| {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        entries
            .into_iter()
            .map(|(dir, name, day, second)| {
                let ts = base
                    + chrono::Duration::days(day)
                    + chrono::Duration::seconds(second as i64);
                Path::new("/store").join(dir).join(naming::encode(ts, name).unwrap())
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_name_codec_round_trips(ts in timestamp_strategy(), original in basename_strategy()) {
        let name = naming::encode(ts, &original).unwrap();
        prop_assert!(naming::is_revision_name(&name));

        let decoded = naming::decode(Path::new(&name)).unwrap();
        prop_assert_eq!(decoded.timestamp, ts);
        prop_assert_eq!(&decoded.original, &original);
        prop_assert_eq!(decoded.file_name(), name);
    }

    #[test]
    fn prop_decode_never_panics(name in "\\PC{0,40}") {
        let _ = naming::decode(Path::new(&name));
    }

    #[test]
    fn prop_mirror_dir_stays_relative(parts in prop::collection::vec(prop_oneof![
        Just("..".to_string()),
        Just(".".to_string()),
        "[a-z]{1,6}",
    ], 0..8)) {
        let original: PathBuf = std::iter::once("/".to_string()).chain(parts).collect();
        let mirrored = naming::mirror_dir(&original);
        prop_assert!(mirrored.is_relative());
        prop_assert!(mirrored
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_))));
    }

    #[test]
    fn prop_grouping_ignores_input_order(files in revisions_strategy()) {
        let root = Path::new("/store");
        let forward = lineage::group(root, &files);

        let mut reversed = files.clone();
        reversed.reverse();
        let backward = lineage::group(root, &reversed);

        prop_assert_eq!(&forward.index, &backward.index);
        prop_assert_eq!(forward.skipped, backward.skipped);
        prop_assert!(forward.index.revision_count() <= files.len());
    }

    #[test]
    fn prop_retention_keeps_newest_days(files in revisions_strategy(), days_limit in 0i64..25) {
        let root = Path::new("/store");
        let index = lineage::group(root, &files).index;
        let policy = RetentionPolicy::new(days_limit).unwrap();
        let expired = policy.expired_revisions(&index);

        let mut expected = 0;
        for (key, buckets) in index.iter() {
            let drop = buckets.len().saturating_sub(days_limit as usize);
            expected += buckets.values().take(drop).map(Vec::len).sum::<usize>();

            // Every expired day is older than every kept day
            let days = index.days(key);
            if drop > 0 && drop < days.len() {
                prop_assert!(days[drop - 1] < days[drop]);
            }
            for (i, (_, paths)) in buckets.iter().enumerate() {
                for path in paths {
                    prop_assert_eq!(expired.contains(path), i < drop);
                }
            }
        }
        prop_assert_eq!(expired.len(), expected);
    }

    #[test]
    fn prop_negative_limits_are_rejected(days_limit in i64::MIN..0) {
        prop_assert!(matches!(
            RetentionPolicy::new(days_limit),
            Err(HistoryError::Policy(_))
        ));
    }
}
