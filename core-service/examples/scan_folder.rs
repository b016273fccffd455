//! # Folder Scan Example
//!
//! Indexes a local music directory into a SQLite database and prints the
//! final counters. Running it again rescans only changed files.
//!
//! Run with: `cargo run --example scan_folder --package core-service -- <music-dir> [index.db]`

use anyhow::{bail, Context};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, ScanEvent};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_service::{CoreService, LocalFolderSource};
use core_sync::ScanConfig;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default().with_format(LogFormat::Compact))?;

    let mut args = std::env::args().skip(1);
    let root = match args.next() {
        Some(dir) => PathBuf::from(dir),
        None => LocalFolderSource::default_root().context("no music directory given")?,
    };
    let database = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("library-index.db"));

    let root = root
        .canonicalize()
        .with_context(|| format!("cannot open {}", root.display()))?;
    let Some(root_id) = LocalFolderSource::identifier_for(&root) else {
        bail!("music directory path is not valid UTF-8");
    };

    let config = CoreConfig::builder().database_path(database).build()?;
    let source = Arc::new(LocalFolderSource::new("local"));
    let core = CoreService::bootstrap(config, source, ScanConfig::default()).await?;

    let mut events = core.events();
    let progress = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let CoreEvent::Scan(ScanEvent::Progress {
                processed,
                total,
                errored,
                ..
            }) = event
            {
                println!("  {processed}/{total} indexed, {errored} failed");
            }
        }
    });

    println!("Scanning {}", root.display());
    let report = core.scan_root(root_id).await?;
    core.shutdown().await;
    progress.abort();

    println!();
    println!("Outcome:            {:?}", report.outcome);
    println!("Tracks seen:        {}", report.counters.total);
    println!("Tracks indexed:     {}", report.counters.processed);
    println!("Tracks failed:      {}", report.counters.errored);
    println!("Tracks removed:     {}", report.removed.tracks_removed);
    println!("Folders removed:    {}", report.removed.containers_removed);
    println!("Duration:           {} ms", report.duration_ms);
    println!("Tracks in index:    {}", core.track_count().await?);

    Ok(())
}
