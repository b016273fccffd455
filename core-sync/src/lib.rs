//! # Scan & Indexing Module
//!
//! Keeps the local index consistent with a hierarchical library source.
//!
//! ## Overview
//!
//! This module manages the lifecycle of scans, including:
//! - Walking the source depth-first from one or more roots
//! - Skipping tracks whose revision the index already holds
//! - Extracting and reconciling metadata before persisting tracks
//! - Pruning index entries the source no longer lists
//! - Reporting progress and completion on the event bus
//!
//! ## Components
//!
//! - **Scan Job State Machine** (`job`): Scan lifecycle with validated state transitions
//! - **Track Processor** (`metadata_processor`): Skip-or-extract, reconcile, persist
//! - **Crawler** (`crawler`): Depth-first walk of one root, building the fresh snapshot
//! - **Tree Differ** (`differ`): Removes stale placements after a crawl
//! - **Progress Reporter** (`progress`): Rate-limited progress events
//! - **Scan Coordinator** (`coordinator`): Orchestrates one scan invocation
//! - **Scan Queue** (`scan_queue`): Runs scan requests one at a time

pub mod coordinator;
pub mod crawler;
pub mod differ;
pub mod error;
pub mod job;
pub mod metadata_processor;
pub mod progress;
pub mod scan_queue;

pub use coordinator::{ScanConfig, ScanCoordinator};
pub use crawler::{CrawlOutcome, Crawler};
pub use differ::{DiffStats, TreeDiffer};
pub use error::{Result, SyncError};
pub use job::{
    ScanCounters, ScanJob, ScanJobId, ScanOutcome, ScanReport, ScanRequest, ScanState,
};
pub use metadata_processor::TrackProcessor;
pub use progress::ProgressReporter;
pub use scan_queue::{ScanQueue, ScanTicket};
