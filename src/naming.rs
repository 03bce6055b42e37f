//! Revision naming convention
//!
//! Every revision stored by local-history is named
//! `YYYY-MM-DD_HH-MM-SS_<original basename>`. The timestamp prefix is fixed
//! width and zero padded, so sorting revision names as strings sorts them
//! chronologically. The original basename is everything after the single `_`
//! that follows the prefix, which keeps basenames such as `my_file.tar.gz` or
//! `_private` intact.
//!
//! The revision store mirrors the original file's directory below the
//! storage root. [`mirror_dir`] is the one place that maps an original
//! directory to its mirrored form; both the snapshot writer and every lookup
//! go through it.
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use local_history::naming::{decode, encode};
//! use std::path::Path;
//!
//! let ts = NaiveDate::from_ymd_opt(2024, 1, 3)
//!     .unwrap()
//!     .and_hms_opt(9, 5, 7)
//!     .unwrap();
//! let name = encode(ts, "app_main.js").unwrap();
//! assert_eq!(name, "2024-01-03_09-05-07_app_main.js");
//!
//! let decoded = decode(Path::new(&name)).unwrap();
//! assert_eq!(decoded.original, "app_main.js");
//! assert_eq!(decoded.timestamp, ts);
//! ```

use crate::error::{HistoryError, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// chrono format of the timestamp prefix
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Length in bytes of the timestamp prefix, boundary excluded
pub const PREFIX_LEN: usize = 19;

/// Separator between the timestamp prefix and the original basename
pub const BOUNDARY: u8 = b'_';

/// Positions of the separators inside the prefix; every other byte is a digit
const PREFIX_SEPARATORS: [(usize, u8); 5] =
    [(4, b'-'), (7, b'-'), (10, b'_'), (13, b'-'), (16, b'-')];

/// Years that fit the four digits of the prefix
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 0..=9999;

/// Calendar day a revision belongs to
///
/// Ordering is chronological, which is also the ordering of the
/// `YYYY-MM-DD` strings the buckets are displayed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DayBucket(pub NaiveDate);

impl DayBucket {
    /// Parse a `YYYY-MM-DD` string
    pub fn parse(day: &str) -> Result<Self> {
        NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .map(DayBucket)
            .map_err(|e| HistoryError::internal(format!("Invalid day '{}': {}", day, e)))
    }

    /// The underlying date
    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for DayBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// A decoded revision file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionName {
    /// Moment the snapshot was taken, to the second
    pub timestamp: NaiveDateTime,
    /// Basename of the file the revision was taken from
    pub original: String,
}

impl RevisionName {
    /// Day bucket of this revision
    pub fn day(&self) -> DayBucket {
        DayBucket(self.timestamp.date())
    }

    /// Time of day of this revision
    pub fn time(&self) -> NaiveTime {
        self.timestamp.time()
    }

    /// Encoded file name
    pub fn file_name(&self) -> String {
        // Decoded prefixes always have four-digit years
        format_name(self.timestamp, &self.original)
    }
}

/// Encode a timestamp and an original basename into a revision file name
///
/// Sub-second precision is dropped.
///
/// # Errors
///
/// [`HistoryError::TimestampOutOfRange`] for years outside 0..=9999, whose
/// prefix would not be 19 bytes wide and would never decode again.
pub fn encode(timestamp: NaiveDateTime, original_basename: &str) -> Result<String> {
    if !YEAR_RANGE.contains(&timestamp.year()) {
        return Err(HistoryError::TimestampOutOfRange { timestamp });
    }
    Ok(format_name(timestamp, original_basename))
}

fn format_name(timestamp: NaiveDateTime, original_basename: &str) -> String {
    format!("{}_{}", timestamp.format(TIMESTAMP_FORMAT), original_basename)
}

/// Decode the file name of `revision_path`
pub fn decode(revision_path: &Path) -> Result<RevisionName> {
    let malformed = || HistoryError::MalformedName {
        path: revision_path.to_path_buf(),
    };

    let name = revision_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(malformed)?;

    let (timestamp, original) = split_name(name).ok_or_else(malformed)?;

    Ok(RevisionName {
        timestamp,
        original: original.to_string(),
    })
}

/// Decode the day bucket and time of day of a revision
pub fn decode_timestamp(revision_path: &Path) -> Result<(DayBucket, NaiveTime)> {
    let name = decode(revision_path)?;
    Ok((name.day(), name.time()))
}

/// Decode the basename of the file a revision was taken from
pub fn decode_original_basename(revision_path: &Path) -> Result<String> {
    decode(revision_path).map(|name| name.original)
}

/// Check whether a file name follows the revision naming convention
pub fn is_revision_name(name: &str) -> bool {
    split_name(name).is_some()
}

fn split_name(name: &str) -> Option<(NaiveDateTime, &str)> {
    let bytes = name.as_bytes();
    if bytes.len() <= PREFIX_LEN + 1 || bytes[PREFIX_LEN] != BOUNDARY {
        return None;
    }

    let has_shape = bytes[..PREFIX_LEN].iter().enumerate().all(|(i, b)| {
        match PREFIX_SEPARATORS.iter().find(|(pos, _)| *pos == i) {
            Some((_, sep)) => b == sep,
            None => b.is_ascii_digit(),
        }
    });
    if !has_shape {
        return None;
    }

    // The prefix is pure ASCII, so both indices are char boundaries
    let timestamp = NaiveDateTime::parse_from_str(&name[..PREFIX_LEN], TIMESTAMP_FORMAT).ok()?;
    Some((timestamp, &name[PREFIX_LEN + 1..]))
}

/// Map an original file's directory to its mirrored form below the storage root
///
/// The result is always relative: the root and any `.`/`..` components are
/// dropped so that joining it onto the storage root can never escape it, and
/// the drive-letter colon of a Windows prefix is stripped because it is not
/// allowed inside a directory name.
pub fn mirror_dir(original_dir: &Path) -> PathBuf {
    let mut mirrored = PathBuf::new();

    for component in original_dir.components() {
        match component {
            Component::Prefix(prefix) => {
                let prefix = prefix.as_os_str().to_string_lossy();
                let cleaned: String = prefix
                    .trim_start_matches(['\\', '?', '.'])
                    .chars()
                    .filter(|c| *c != ':')
                    .collect();
                if !cleaned.is_empty() {
                    mirrored.push(cleaned);
                }
            }
            Component::Normal(part) => mirrored.push(part),
            Component::RootDir | Component::CurDir | Component::ParentDir => {}
        }
    }

    mirrored
}
