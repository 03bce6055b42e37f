//! # local-history CLI
//!
//! Command-line front end for the local-history revision store.
//!
//! ## Usage
//! ```bash
//! # Snapshot a file into the store
//! local-history --storage ~/.local-history save src/app.js
//!
//! # List the revisions of a file, newest first
//! local-history --storage ~/.local-history list src/app.js
//!
//! # Preview, then run, a purge keeping 30 days per file
//! local-history --storage ~/.local-history purge --days 30 --dry-run
//! local-history --storage ~/.local-history purge --days 30
//!
//! # Purge at most once a day (for login scripts or cron)
//! local-history purge --if-due
//! ```

use anyhow::Context;
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use humantime::format_duration;
use indicatif::{ProgressBar, ProgressStyle};
use local_history::{
    format_bytes, naming, purge_if_due, HistoryConfig, HistoryError, PurgeReport, PurgeStamp,
    Purger, PurgerBuilder, RevisionStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// local-history - keep and prune the revisions of your files
#[derive(Parser)]
#[command(name = "local-history")]
#[command(version)]
#[command(about = "Snapshot files into a revision store and purge old revisions")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Storage directory (overrides the configuration)
    #[arg(short, long, global = true)]
    storage: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete revisions older than the retention window
    Purge {
        /// Days of revisions kept per file (overrides the configuration)
        #[arg(short, long, allow_negative_numbers = true)]
        days: Option<i64>,

        /// Only report what would be deleted
        #[arg(long)]
        dry_run: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Skip the purge if one already ran in the last 24 hours
        #[arg(long)]
        if_due: bool,
    },

    /// Save a revision of a file
    Save {
        /// File to snapshot
        file: PathBuf,
    },

    /// List the revisions of a file
    #[command(alias = "ls")]
    List {
        /// Original file
        file: PathBuf,

        /// Limit results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show what the store holds
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli).await {
        let message = match e.downcast_ref::<HistoryError>() {
            Some(err) => err.user_message(),
            None => format!("{:#}", e),
        };
        eprintln!("{}: {}", "Error".red().bold(), message);
        std::process::exit(1);
    }
}

/// Main command runner
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => HistoryConfig::load(path)
            .with_context(|| format!("Cannot load configuration {}", path.display()))?,
        None => HistoryConfig::default(),
    };
    if let Some(storage) = cli.storage {
        config.storage_path = storage;
    }

    match cli.command {
        Commands::Purge {
            days,
            dry_run,
            json,
            if_due,
        } => {
            if let Some(days) = days {
                config.days_limit = days;
            }
            cmd_purge(&config, dry_run, json, if_due).await
        }
        Commands::Save { file } => cmd_save(&config, &file).await,
        Commands::List { file, limit } => cmd_list(&config, &file, limit),
        Commands::Status => cmd_status(&config),
    }
}

/// Purge the store
///
/// With `--if-due`, the purge only runs when `auto_purge` is enabled and the
/// last automatic purge is more than a day old.
async fn cmd_purge(
    config: &HistoryConfig,
    dry_run: bool,
    json: bool,
    if_due: bool,
) -> anyhow::Result<()> {
    let purger: Purger = PurgerBuilder::from_config(config.clone())
        .sink(Arc::new(local_history::LogSink))
        .process_lock(true)
        .build()?;

    if if_due && !dry_run && !purger.auto_purge() {
        if !json {
            println!(
                "{} Automatic purge disabled (set 'auto_purge' to enable it)",
                "•".yellow()
            );
        }
        return Ok(());
    }

    let spinner = if json {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}")
        {
            pb.set_style(style);
        }
        pb.set_message(format!("Purging {}...", config.storage_path.display()));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    };

    let start = Instant::now();
    let outcome = if dry_run {
        purger.analyze().await.map(Some)
    } else if if_due {
        let stamp = PurgeStamp::for_storage_root(purger.root());
        purge_if_due(&purger, &stamp, Utc::now()).await
    } else {
        purger.run().await.map(Some)
    };

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let report = match outcome? {
        Some(report) => report,
        None => {
            if !json {
                println!("{} Purge not due yet", "•".yellow());
            }
            return Ok(());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, config, start.elapsed());
    }

    Ok(())
}

fn print_report(report: &PurgeReport, config: &HistoryConfig, elapsed: Duration) {
    if report.dry_run {
        println!(
            "{} {} revisions would be deleted (keeping {} days)",
            "Dry run:".blue().bold(),
            report.files_expired.to_string().yellow(),
            config.days_limit
        );
    } else {
        println!(
            "{} Purged {}",
            "✓".green().bold(),
            config.storage_path.display().to_string().cyan()
        );
        println!("  Deleted: {} revisions", report.files_deleted.to_string().cyan());
        println!("  Removed: {} directories", report.dirs_removed.to_string().cyan());
    }
    println!("  Scanned: {} files in {} lineages", report.files_scanned, report.lineages);
    if !report.skipped.is_empty() {
        println!("  Skipped: {} foreign files", report.skipped.len().to_string().yellow());
    }
    println!(
        "  Time: {}",
        format_duration(Duration::from_millis(elapsed.as_millis() as u64)).to_string().cyan()
    );

    if !report.failures.is_empty() {
        println!("\n{} {} failures:", "✗".red().bold(), report.failures.len());
        for failure in &report.failures {
            match &failure.path {
                Some(path) => println!(
                    "  [{}] {}: {}",
                    failure.kind,
                    path.display(),
                    failure.cause.red()
                ),
                None => println!("  [{}] {}", failure.kind, failure.cause.red()),
            }
        }
    }
}

/// Save a revision of a file, unless it reaches the configured size limit
async fn cmd_save(config: &HistoryConfig, file: &Path) -> anyhow::Result<()> {
    let original = std::path::absolute(file)?;
    let metadata = tokio::fs::metadata(&original)
        .await
        .with_context(|| format!("Cannot read {}", original.display()))?;
    config.check_file_size(&original, metadata.len())?;

    let contents = tokio::fs::read(&original)
        .await
        .with_context(|| format!("Cannot read {}", original.display()))?;

    let store = RevisionStore::new(&config.storage_path);
    let path = store
        .save_revision(&original, &contents, Local::now().naive_local())
        .await?;

    println!("{} Saved revision", "✓".green().bold());
    println!("  {}", path.display().to_string().cyan());
    Ok(())
}

/// List the revisions of a file, newest first
fn cmd_list(config: &HistoryConfig, file: &Path, limit: Option<usize>) -> anyhow::Result<()> {
    let original = std::path::absolute(file)?;
    let store = RevisionStore::new(&config.storage_path);
    let revisions = store.list_revisions(&original)?;

    if revisions.is_empty() {
        println!("No revisions of {}", original.display());
        return Ok(());
    }

    println!(
        "{} ({} revisions)",
        original.display().to_string().bold(),
        revisions.len()
    );
    for revision in revisions.iter().take(limit.unwrap_or(usize::MAX)) {
        let when = naming::decode(revision)
            .map(|name| name.timestamp.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        let relative = revision.strip_prefix(store.root()).unwrap_or(revision);
        println!("  {}  {}", when.yellow(), relative.display().to_string().dimmed());
    }

    Ok(())
}

/// Show store statistics
fn cmd_status(config: &HistoryConfig) -> anyhow::Result<()> {
    let store = RevisionStore::new(&config.storage_path);
    let stats = store.stats()?;

    println!("{}", "Revision store".blue().bold());
    println!("  Path: {}", config.storage_path.display().to_string().cyan());
    println!("  Revisions: {}", stats.revisions.to_string().cyan());
    println!("  Files tracked: {}", stats.lineages.to_string().cyan());
    println!("  Size: {}", format_bytes(stats.total_bytes).cyan());
    println!("  Directories: {}", stats.directories);
    if stats.foreign_files > 0 {
        println!("  Foreign files: {}", stats.foreign_files.to_string().yellow());
    }
    println!("  Retention: {} days", config.days_limit);

    let stamp = PurgeStamp::for_storage_root(&config.storage_path);
    match stamp.last_purge() {
        Some(last) => println!(
            "  Last automatic purge: {}",
            last.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        ),
        None => println!("  Last automatic purge: never"),
    }
    if config.auto_purge {
        println!("  Automatic purge: {}", "enabled".green());
    }

    Ok(())
}
