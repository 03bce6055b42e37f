//! Removal of directories emptied by a purge
//!
//! Every directory the scanner saw is offered for removal once all deletions
//! of the run have been attempted. Directories are processed deepest first,
//! so a parent whose only content was emptied children goes away in the same
//! pass. A directory that still has content is simply left in place: that is
//! the common case, not a failure.

use crate::error::HistoryError;
use crate::events::{PurgeEvent, PurgeSink};
use std::io;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, trace, warn};

/// Outcome of an empty-directory pass
#[derive(Debug, Default)]
pub struct CollectOutcome {
    /// Directories removed
    pub removed: usize,
    /// Removals that failed for a reason other than the directory having content
    pub failures: Vec<HistoryError>,
}

/// Remove every directory of `directories` that is empty
///
/// Failures other than "not empty" or "already gone" are sent to `sink` and
/// returned in [`CollectOutcome::failures`].
pub async fn remove_if_empty(
    mut directories: Vec<PathBuf>,
    sink: &dyn PurgeSink,
) -> CollectOutcome {
    let mut outcome = CollectOutcome::default();

    // Children before parents
    directories.sort_by(|a, b| {
        b.components()
            .count()
            .cmp(&a.components().count())
            .then_with(|| a.cmp(b))
    });
    directories.dedup();

    for dir in directories {
        match fs::remove_dir(&dir).await {
            Ok(()) => {
                trace!("Removed empty directory {:?}", dir);
                outcome.removed += 1;
            }
            Err(e) if is_expected(&e) => {}
            Err(source) => {
                let err = HistoryError::DirRemove { path: dir, source };
                warn!("{}", err);
                sink.on_event(&PurgeEvent::Error {
                    path: err.path().cloned(),
                    cause: err.to_string(),
                });
                outcome.failures.push(err);
            }
        }
    }

    debug!(
        "Removed {} empty directories ({} failures)",
        outcome.removed,
        outcome.failures.len()
    );

    outcome
}

fn is_expected(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::DirectoryNotEmpty | io::ErrorKind::NotFound
    )
}
