//! # Scan Coordinator
//!
//! Orchestrates one scan invocation against a single library source.
//!
//! ## Overview
//!
//! The `ScanCoordinator` is constructed with exactly one `LibrarySource`, one
//! `IndexStore`, one `Extractor` and one `EventBus`. For each request it:
//! - Resolves the roots to scan (`RescanRoot`, `RescanAll`, `ScanDefault`)
//! - Checks connectivity when the source needs the network
//! - Crawls each root in order, committing containers and tracks top-down
//! - Diffs the pre-crawl snapshot against the crawl and prunes stale entries
//! - Notifies index observers once and emits a single completion event
//!
//! ## Workflow
//!
//! ```text
//! Idle → CheckingConnectivity ─┬→ NoConnection (event, stop)
//!                              └→ Scanning: for each root
//!                                   before = build_tree(root)
//!                                   after  = crawl(root)
//!                                   remove_stale(before, after)
//!                                → Completed: notify_observers, Completed event
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{ScanCoordinator, ScanRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(coordinator: ScanCoordinator) -> core_sync::Result<()> {
//! let report = coordinator
//!     .run(ScanRequest::RescanAll { source_id: "local".into() }, CancellationToken::new())
//!     .await?;
//! println!("{} of {} tracks indexed", report.counters.processed, report.counters.total);
//! # Ok(())
//! # }
//! ```

use crate::crawler::Crawler;
use crate::differ::TreeDiffer;
use crate::job::{ScanJob, ScanReport, ScanRequest};
use crate::metadata_processor::TrackProcessor;
use crate::progress::ProgressReporter;
use crate::{Result, SyncError};
use bridge_traits::network::{NetworkMonitor, NetworkStatus};
use bridge_traits::source::{Identifier, LibrarySource};
use core_library::models::NodeKey;
use core_library::IndexStore;
use core_metadata::Extractor;
use core_runtime::events::{CoreEvent, EventBus, ScanEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Scan configuration
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Timeout for a single children query (seconds)
    pub list_timeout_secs: u64,

    /// Minimum interval between progress events (milliseconds)
    pub progress_interval_ms: u64,

    /// Scan requests that may wait in the queue before `submit` blocks
    pub queue_capacity: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            list_timeout_secs: 30,
            progress_interval_ms: 2000,
            queue_capacity: 16,
        }
    }
}

impl ScanConfig {
    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

/// Scan orchestrator for one library source
pub struct ScanCoordinator {
    config: ScanConfig,
    source: Arc<dyn LibrarySource>,
    store: Arc<dyn IndexStore>,
    event_bus: EventBus,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    crawler: Crawler,
    differ: TreeDiffer,
}

impl ScanCoordinator {
    /// Create a new coordinator
    ///
    /// # Arguments
    ///
    /// * `config` - Timeouts and progress rate
    /// * `source` - The library source to crawl
    /// * `store` - Index store receiving the results
    /// * `extractor` - Tag extractor for new and changed tracks
    /// * `event_bus` - Event bus for scan notifications
    pub fn new(
        config: ScanConfig,
        source: Arc<dyn LibrarySource>,
        store: Arc<dyn IndexStore>,
        extractor: Arc<dyn Extractor>,
        event_bus: EventBus,
    ) -> Self {
        let processor = TrackProcessor::new(store.clone(), extractor);
        let crawler = Crawler::new(
            source.clone(),
            store.clone(),
            processor,
            config.list_timeout(),
        );
        let differ = TreeDiffer::new(store.clone());

        Self {
            config,
            source,
            store,
            event_bus,
            network_monitor: None,
            crawler,
            differ,
        }
    }

    /// Consult `monitor` before scanning sources that need the network
    pub fn with_network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    pub fn source_id(&self) -> &str {
        self.source.source_id()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Run one scan invocation to completion.
    ///
    /// Per-track and per-container failures are counted in the report. A
    /// root whose stored snapshot cannot be loaded is skipped and counted in
    /// `failed_roots`. Cancelling `token` stops the crawl between container
    /// visits; a cancelled root is never diffed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnknownSource`] when the request names another
    /// source, or a library error when the roots cannot be resolved.
    #[instrument(skip(self, request, token), fields(source_id = %self.source.source_id()))]
    pub async fn run(&self, request: ScanRequest, token: CancellationToken) -> Result<ScanReport> {
        if let Some(requested) = request.source_id() {
            if requested != self.source_id() {
                return Err(SyncError::UnknownSource {
                    source_id: requested.to_string(),
                });
            }
        }

        let mut job = ScanJob::new(self.source_id());
        job.begin_connectivity_check()?;

        if !self.has_connectivity().await {
            job.no_connection()?;
            info!(scan_id = %job.id, "No connectivity, scan skipped");
            self.emit(ScanEvent::NoConnection {
                scan_id: job.id.to_string(),
                source_id: job.source_id.clone(),
            });
            return Ok(job.report());
        }

        let roots = self.resolve_roots(request).await?;
        job.start_scanning()?;
        info!(scan_id = %job.id, roots = roots.len(), "Scan started");
        self.emit(ScanEvent::Started {
            scan_id: job.id.to_string(),
            source_id: job.source_id.clone(),
            roots: roots.len() as u64,
        });

        let mut progress =
            ProgressReporter::new(self.event_bus.clone(), job.id, self.config.progress_interval());
        let mut cancelled = false;

        for (root, parent) in roots {
            if token.is_cancelled() {
                cancelled = true;
                break;
            }
            if !self.scan_root(&mut job, &root, &parent, &token, &mut progress).await {
                cancelled = true;
                break;
            }
        }

        if cancelled {
            job.cancel()?;
        } else {
            job.complete()?;
        }

        if let Err(e) = self.store.notify_observers().await {
            warn!(error = %e, "Failed to notify index observers");
        }

        let report = job.report();
        info!(
            scan_id = %report.scan_id,
            processed = report.counters.processed,
            total = report.counters.total,
            errored = report.counters.errored,
            tracks_removed = report.removed.tracks_removed,
            containers_removed = report.removed.containers_removed,
            failed_roots = report.failed_roots,
            cancelled,
            "Scan finished"
        );
        self.emit(ScanEvent::Completed {
            scan_id: report.scan_id.to_string(),
            processed: report.counters.processed,
            total: report.counters.total,
            errored: report.counters.errored,
            tracks_removed: report.removed.tracks_removed,
            containers_removed: report.removed.containers_removed,
            failed_roots: report.failed_roots,
            cancelled,
            duration_ms: report.duration_ms,
        });

        Ok(report)
    }

    /// Scan one root; returns `false` when the crawl was cancelled.
    #[instrument(skip(self, job, token, progress), fields(root = %root))]
    async fn scan_root(
        &self,
        job: &mut ScanJob,
        root: &Identifier,
        parent: &Identifier,
        token: &CancellationToken,
        progress: &mut ProgressReporter,
    ) -> bool {
        let before = match self.store.build_tree(root, parent).await {
            Ok(before) => before,
            Err(e) => {
                warn!(error = %e, "Failed to load stored snapshot, skipping root");
                job.failed_roots += 1;
                return true;
            }
        };

        let outcome = self
            .crawler
            .crawl(root, parent, token, &mut job.counters, progress)
            .await;

        if outcome.cancelled {
            info!("Crawl cancelled, stale entries kept");
            return false;
        }

        let stats = self.differ.remove_stale(&before, &outcome.snapshot).await;
        debug!(
            containers = outcome.containers_visited,
            tracks_removed = stats.tracks_removed,
            containers_removed = stats.containers_removed,
            "Root scanned"
        );
        job.removed.merge(stats);
        true
    }

    async fn resolve_roots(&self, request: ScanRequest) -> Result<Vec<NodeKey>> {
        match request {
            ScanRequest::RescanRoot {
                container, parent, ..
            }
            | ScanRequest::ScanDefault { container, parent } => Ok(vec![(container, parent)]),
            ScanRequest::RescanAll { source_id } => {
                let roots = self.store.find_top_level_containers(&source_id).await?;
                if roots.is_empty() {
                    debug!(source_id = %source_id, "No indexed roots to rescan");
                }
                Ok(roots)
            }
        }
    }

    async fn has_connectivity(&self) -> bool {
        if !self.source.requires_network() {
            return true;
        }
        let Some(monitor) = &self.network_monitor else {
            return true;
        };

        match monitor.get_network_info().await {
            Ok(info) => info.status != NetworkStatus::Disconnected,
            Err(e) => {
                warn!(error = %e, "Network check failed, assuming connectivity");
                true
            }
        }
    }

    fn emit(&self, event: ScanEvent) {
        // No subscribers is fine
        self.event_bus.emit(CoreEvent::Scan(event)).ok();
    }
}
