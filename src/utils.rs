//! Utility functions for local-history
//!
//! Small path and formatting helpers shared by the scanner, the grouper and
//! the command line interface.

use crate::error::{HistoryError, Result};
use std::path::{Path, PathBuf};

/// Make a path relative to a base path
///
/// Tries a lexical strip first so symbolic links keep their own path, and
/// falls back to comparing canonical paths when the lexical strip fails
/// (relative components, differing normalisation).
///
/// # Errors
///
/// - [`HistoryError::Internal`] if the path is not under the base path
/// - [`HistoryError::Io`] if canonicalization fails (fallback case only)
///
/// # Example
///
/// ```rust,ignore
/// use crate::utils::make_relative;
/// use std::path::{Path, PathBuf};
///
/// let base = Path::new("/store");
/// let full = Path::new("/store/home/me/2024-01-01_10-00-00_a.txt");
/// assert_eq!(
///     make_relative(full, base)?,
///     PathBuf::from("home/me/2024-01-01_10-00-00_a.txt")
/// );
/// ```
pub fn make_relative(path: &Path, base: &Path) -> Result<PathBuf> {
    if let Ok(relative) = path.strip_prefix(base) {
        return Ok(relative.to_path_buf());
    }

    let path_canon = path.canonicalize()?;
    let base_canon = base.canonicalize()?;

    path_canon
        .strip_prefix(&base_canon)
        .map(|p| p.to_path_buf())
        .map_err(|_| HistoryError::internal(format!(
            "Path {:?} is not relative to {:?}",
            path_canon, base_canon
        )))
}

/// Whether `path` lies strictly below `root`, judged lexically
///
/// Paths containing `..` are never considered inside, whatever they would
/// resolve to.
pub fn is_within(path: &Path, root: &Path) -> bool {
    match path.strip_prefix(root) {
        Ok(rest) => {
            !rest.as_os_str().is_empty()
                && rest
                    .components()
                    .all(|c| matches!(c, std::path::Component::Normal(_)))
        }
        Err(_) => false,
    }
}

/// Format bytes in human-readable form
///
/// Uses binary units (1024-based). Values under 1 KB are printed as whole
/// numbers, larger values with two decimals.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
