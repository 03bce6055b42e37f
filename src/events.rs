//! Purge event reporting
//!
//! A purge run reports what it does through a [`PurgeSink`]: one
//! [`PurgeEvent::Started`], one [`PurgeEvent::Error`] per failure as soon as
//! it happens, and one [`PurgeEvent::Finished`] at the end. Sinks are fire and
//! forget; a run never waits on a sink.
//!
//! # Examples
//!
//! ```rust
//! use local_history::events::{PurgeEvent, PurgeSink};
//!
//! struct StatusLine;
//!
//! impl PurgeSink for StatusLine {
//!     fn on_event(&self, event: &PurgeEvent) {
//!         if let PurgeEvent::Finished { files_deleted, .. } = event {
//!             println!("purged {} revisions", files_deleted);
//!         }
//!     }
//! }
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Structured event emitted during a purge run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum PurgeEvent {
    /// A run started
    #[serde(rename = "purge-started")]
    Started {
        /// Storage root being purged
        root: PathBuf,
    },
    /// A run completed
    #[serde(rename = "purge-finished")]
    Finished {
        /// Revision files deleted
        files_deleted: usize,
        /// Directories removed
        dirs_removed: usize,
    },
    /// Something failed; the run carries on
    #[serde(rename = "purge-error")]
    Error {
        /// Path involved, when the failure concerns one
        path: Option<PathBuf>,
        /// Human-readable cause
        cause: String,
    },
}

/// Receiver of purge events
///
/// Implementations must return quickly; anything slow belongs on another task.
pub trait PurgeSink: Send + Sync {
    /// Called for every event of a run
    fn on_event(&self, event: &PurgeEvent);
}

/// Sink that forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl PurgeSink for LogSink {
    fn on_event(&self, event: &PurgeEvent) {
        match event {
            PurgeEvent::Started { root } => info!("local-history:purge start ({:?})", root),
            PurgeEvent::Finished {
                files_deleted,
                dirs_removed,
            } => info!(
                "local-history:purge end ({} files deleted, {} directories removed)",
                files_deleted, dirs_removed
            ),
            PurgeEvent::Error { path, cause } => {
                error!("local-history:error-purge path={:?}: {}", path, cause)
            }
        }
    }
}

/// Sink that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpSink;

impl PurgeSink for NoOpSink {
    fn on_event(&self, _event: &PurgeEvent) {}
}

/// Sink that forwards events over an unbounded tokio channel
///
/// Sending never blocks; events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<PurgeEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiving half of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PurgeEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl PurgeSink for ChannelSink {
    fn on_event(&self, event: &PurgeEvent) {
        let _ = self.sender.send(event.clone());
    }
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<PurgeEvent>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far
    pub fn events(&self) -> Vec<PurgeEvent> {
        self.events.lock().clone()
    }

    /// Error events received so far
    pub fn errors(&self) -> Vec<PurgeEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, PurgeEvent::Error { .. }))
            .cloned()
            .collect()
    }
}

impl PurgeSink for MemorySink {
    fn on_event(&self, event: &PurgeEvent) {
        self.events.lock().push(event.clone());
    }
}
