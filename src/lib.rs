//! # local-history - retention for side-by-side revision stores
//!
//! Editors and tools that keep a "local history" save a copy of a file every
//! time it is saved, into a revision store that mirrors the file's directory:
//!
//! ```text
//! <storage root>/home/me/project/src/2024-01-03_09-05-07_app.js
//! <storage root>/home/me/project/src/2024-01-03_17-41-00_app.js
//! ```
//!
//! Left alone, that store grows forever. This crate is the engine that keeps
//! it bounded.
//!
//! ## Overview
//!
//! A purge run:
//! - scans the store asynchronously ([`scanner`])
//! - groups revision files back into one lineage per original file, bucketed
//!   by calendar day ([`lineage`], using the [`naming`] convention)
//! - keeps the `days_limit` most recent days of each lineage and deletes the
//!   rest ([`retention`])
//! - removes the directories those deletions left empty ([`collector`])
//!
//! Failures on single files or directories never stop a run; they are
//! collected in the [`PurgeReport`] and reported to a [`PurgeSink`] as they
//! happen. Only an invalid retention policy aborts a run, before anything is
//! touched.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use local_history::{HistoryConfig, Purger};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HistoryConfig {
//!     days_limit: 30,
//!     ..HistoryConfig::with_storage_path("/home/me/.local-history")
//! };
//!
//! let purger = Purger::new(&config)?;
//! let report = purger.run().await?;
//! println!("Deleted {} revisions", report.files_deleted);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`naming`]: revision file name codec and directory mirroring
//! - [`scanner`]: asynchronous recursive store scanning
//! - [`lineage`]: grouping of revisions by original file and day
//! - [`retention`]: retention policy and expired revision deletion
//! - [`collector`]: empty directory removal
//! - [`purge`]: orchestration of a full run
//! - [`lock`]: per-root serialization of runs
//! - [`events`]: purge event sinks
//! - [`history`]: writing and listing revisions
//! - [`schedule`]: once-a-day automatic purge gate
//! - [`config`]: configuration
//! - [`types`]: reports and statistics
//! - [`error`]: error types

pub mod collector;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod lineage;
pub mod lock;
pub mod naming;
pub mod purge;
pub mod retention;
pub mod scanner;
pub mod schedule;
pub mod types;

mod utils;

pub use config::HistoryConfig;
pub use error::{HistoryError, Result};
pub use events::{ChannelSink, LogSink, MemorySink, NoOpSink, PurgeEvent, PurgeSink};
pub use history::RevisionStore;
pub use lineage::{LineageKey, RevisionIndex};
pub use lock::StoreLock;
pub use naming::DayBucket;
pub use purge::{purge, Purger, PurgerBuilder};
pub use retention::RetentionPolicy;
pub use schedule::{purge_if_due, PurgeStamp};
pub use types::{FailureKind, PurgeFailure, PurgeReport, StoreStats};
pub use utils::format_bytes;
