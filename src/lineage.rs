//! Grouping of revision files into lineages
//!
//! A lineage is the set of all revisions of one original file. Revisions live
//! in the mirrored copy of the original's directory and carry the original
//! basename after their timestamp prefix, so the pair
//! `(directory relative to the storage root, original basename)` identifies
//! the lineage. Inside a lineage revisions are bucketed by calendar day,
//! which is the unit the retention policy counts in.

use crate::naming::{self, DayBucket};
use crate::utils;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Identity of the original file a revision was taken from
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineageKey {
    /// Mirrored directory, relative to the storage root
    pub dir: PathBuf,
    /// Basename of the original file
    pub original: String,
}

impl LineageKey {
    /// Create a key from a relative directory and an original basename
    pub fn new(dir: impl Into<PathBuf>, original: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            original: original.into(),
        }
    }

    /// Relative path of the original file
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.original)
    }
}

impl fmt::Display for LineageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}

/// Revisions of one lineage, bucketed by day in chronological order
pub type DayBuckets = BTreeMap<DayBucket, Vec<PathBuf>>;

/// All lineages found in one scan of the store
///
/// Paths inside a bucket are kept sorted, so two indexes built from the same
/// files compare equal whatever order the files arrived in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevisionIndex {
    lineages: BTreeMap<LineageKey, DayBuckets>,
}

impl RevisionIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` as a revision of `key` taken on `day`
    pub fn insert(&mut self, key: LineageKey, day: DayBucket, path: PathBuf) {
        let bucket = self.lineages.entry(key).or_default().entry(day).or_default();
        if let Err(pos) = bucket.binary_search(&path) {
            bucket.insert(pos, path);
        }
    }

    /// Day buckets of one lineage
    pub fn get(&self, key: &LineageKey) -> Option<&DayBuckets> {
        self.lineages.get(key)
    }

    /// Iterate lineages in key order
    pub fn iter(&self) -> impl Iterator<Item = (&LineageKey, &DayBuckets)> {
        self.lineages.iter()
    }

    /// Distinct days of one lineage, oldest first
    pub fn days(&self, key: &LineageKey) -> Vec<DayBucket> {
        self.lineages
            .get(key)
            .map(|days| days.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Number of lineages
    pub fn len(&self) -> usize {
        self.lineages.len()
    }

    /// Whether the index holds no lineage
    pub fn is_empty(&self) -> bool {
        self.lineages.is_empty()
    }

    /// Total number of revisions across all lineages
    pub fn revision_count(&self) -> usize {
        self.lineages
            .values()
            .flat_map(|days| days.values())
            .map(Vec::len)
            .sum()
    }
}

/// Outcome of grouping a flat file list
#[derive(Debug, Clone, Default)]
pub struct Grouping {
    /// Revisions grouped by lineage and day
    pub index: RevisionIndex,
    /// Files that do not follow the naming convention; left untouched
    pub skipped: Vec<PathBuf>,
}

/// Group revision files found below `root` into lineages
pub fn group<I, P>(root: &Path, files: I) -> Grouping
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut grouping = Grouping::default();

    for file in files {
        let path = file.as_ref();
        let name = match naming::decode(path) {
            Ok(name) => name,
            Err(e) => {
                warn!("Skipping file outside the naming convention: {}", e);
                grouping.skipped.push(path.to_path_buf());
                continue;
            }
        };

        let parent = path.parent().unwrap_or(root);
        let dir = utils::make_relative(parent, root).unwrap_or_else(|_| parent.to_path_buf());
        let day = name.day();

        grouping
            .index
            .insert(LineageKey::new(dir, name.original), day, path.to_path_buf());
    }

    grouping.skipped.sort();

    debug!(
        "Grouped {} revisions into {} lineages ({} skipped)",
        grouping.index.revision_count(),
        grouping.index.len(),
        grouping.skipped.len()
    );

    grouping
}
