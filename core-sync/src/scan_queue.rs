//! # Scan Queue
//!
//! Runs scan requests one at a time on a dedicated worker task.
//!
//! ## Overview
//!
//! Requests submitted while a scan is running wait in a bounded channel and
//! execute strictly in submission order. Each submission gets a
//! [`ScanTicket`] resolving to that scan's [`ScanReport`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_sync::{ScanQueue, ScanRequest};
//!
//! # async fn example(coordinator: std::sync::Arc<core_sync::ScanCoordinator>) -> core_sync::Result<()> {
//! let queue = ScanQueue::spawn(coordinator, 16);
//!
//! let ticket = queue
//!     .submit(ScanRequest::RescanAll { source_id: "local".into() })
//!     .await?;
//! let report = ticket.wait().await?;
//!
//! queue.shutdown().await;
//! # Ok(())
//! # }
//! ```

use crate::coordinator::ScanCoordinator;
use crate::error::{Result, SyncError};
use crate::job::{ScanReport, ScanRequest};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct QueuedScan {
    request: ScanRequest,
    reply: oneshot::Sender<Result<ScanReport>>,
}

/// Pending result of a submitted scan
pub struct ScanTicket {
    receiver: oneshot::Receiver<Result<ScanReport>>,
}

impl ScanTicket {
    /// Wait for the scan to finish.
    ///
    /// # Errors
    ///
    /// The scan's own error, or [`SyncError::QueueClosed`] when the queue
    /// shut down before running it.
    pub async fn wait(self) -> Result<ScanReport> {
        self.receiver.await.map_err(|_| SyncError::QueueClosed)?
    }
}

/// Sequential scan worker
pub struct ScanQueue {
    sender: mpsc::Sender<QueuedScan>,
    current: Arc<Mutex<Option<CancellationToken>>>,
    shutdown: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ScanQueue {
    /// Start the worker task. Must be called from within a Tokio runtime.
    pub fn spawn(coordinator: Arc<ScanCoordinator>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let current = Arc::new(Mutex::new(None));
        let shutdown = CancellationToken::new();

        let worker = tokio::spawn(run_worker(
            coordinator,
            receiver,
            current.clone(),
            shutdown.clone(),
        ));

        Self {
            sender,
            current,
            shutdown,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Enqueue a scan request.
    ///
    /// Waits for room when the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::QueueClosed`] after shutdown.
    pub async fn submit(&self, request: ScanRequest) -> Result<ScanTicket> {
        let (reply, receiver) = oneshot::channel();
        self.sender
            .send(QueuedScan { request, reply })
            .await
            .map_err(|_| SyncError::QueueClosed)?;
        Ok(ScanTicket { receiver })
    }

    /// Submit and wait for the report
    pub async fn scan(&self, request: ScanRequest) -> Result<ScanReport> {
        self.submit(request).await?.wait().await
    }

    /// Cancel the scan currently running, if any.
    ///
    /// Queued requests are unaffected. Returns whether a scan was cancelled.
    pub async fn cancel_current(&self) -> bool {
        match self.current.lock().await.as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel the running scan, drop queued requests and stop the worker.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(worker) = self.worker.lock().await.take() {
            if let Err(e) = worker.await {
                warn!(error = %e, "Scan worker ended abnormally");
            }
        }
        info!("Scan queue stopped");
    }
}

async fn run_worker(
    coordinator: Arc<ScanCoordinator>,
    mut receiver: mpsc::Receiver<QueuedScan>,
    current: Arc<Mutex<Option<CancellationToken>>>,
    shutdown: CancellationToken,
) {
    debug!(source_id = %coordinator.source_id(), "Scan worker started");

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            next = receiver.recv() => next,
        };
        let Some(QueuedScan { request, reply }) = next else {
            break;
        };

        let token = shutdown.child_token();
        *current.lock().await = Some(token.clone());
        let result = coordinator.run(request, token).await;
        *current.lock().await = None;

        if reply.send(result).is_err() {
            debug!("Scan requester went away before the result");
        }
    }

    receiver.close();
    debug!("Scan worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::ScanConfig;
    use crate::job::ScanOutcome;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::source::{ChildListing, Container, Identifier, LibrarySource, Resource};
    use core_library::db::create_test_pool;
    use core_library::models::TrackMetadata;
    use core_library::SqliteIndexStore;
    use core_metadata::{Extractor, Result as MetadataResult};
    use core_runtime::events::EventBus;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct FixedExtractor;

    #[async_trait]
    impl Extractor for FixedExtractor {
        async fn extract(&self, _resource: &Resource) -> MetadataResult<TrackMetadata> {
            Ok(TrackMetadata::default())
        }
    }

    /// Every container has one child container, so a scan only ends when cancelled
    struct EndlessSource {
        entered: Notify,
    }

    #[async_trait]
    impl LibrarySource for EndlessSource {
        fn source_id(&self) -> &str {
            "endless"
        }

        async fn list_children(&self, container: &Identifier) -> BridgeResult<ChildListing> {
            self.entered.notify_one();
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(ChildListing {
                tracks: Vec::new(),
                containers: vec![Container::new(
                    format!("{}/x", container.as_str()),
                    container.clone(),
                )],
            })
        }
    }

    /// Empty containers; records which roots were listed
    #[derive(Default)]
    struct FlatSource {
        listed: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl LibrarySource for FlatSource {
        fn source_id(&self) -> &str {
            "flat"
        }

        async fn list_children(&self, container: &Identifier) -> BridgeResult<ChildListing> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.listed.lock().unwrap().push(container.as_str().to_string());
            Ok(ChildListing::default())
        }
    }

    async fn queue(source: Arc<dyn LibrarySource>) -> ScanQueue {
        let store = SqliteIndexStore::new(create_test_pool().await.unwrap(), source.source_id());
        let coordinator = ScanCoordinator::new(
            ScanConfig::default(),
            source,
            Arc::new(store),
            Arc::new(FixedExtractor),
            EventBus::new(64),
        );
        ScanQueue::spawn(Arc::new(coordinator), 4)
    }

    fn request(root: &str) -> ScanRequest {
        ScanRequest::ScanDefault {
            container: Identifier::new(root),
            parent: Identifier::none(),
        }
    }

    #[tokio::test]
    async fn test_cancel_current_stops_running_scan() {
        let source = Arc::new(EndlessSource {
            entered: Notify::new(),
        });
        let queue = queue(source.clone()).await;

        let ticket = queue.submit(request("root")).await.unwrap();
        source.entered.notified().await;
        assert!(queue.cancel_current().await);

        let report = ticket.wait().await.unwrap();
        assert_eq!(report.outcome, ScanOutcome::Cancelled);

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_requests_run_in_order() {
        let source = Arc::new(FlatSource::default());
        let queue = queue(source.clone()).await;

        let mut tickets = Vec::new();
        for root in ["first", "second", "third"] {
            tickets.push(queue.submit(request(root)).await.unwrap());
        }

        let mut ids = Vec::new();
        for ticket in tickets {
            let report = ticket.wait().await.unwrap();
            assert_eq!(report.outcome, ScanOutcome::Completed);
            ids.push(report.scan_id);
        }

        assert_eq!(*source.listed.lock().unwrap(), vec!["first", "second", "third"]);
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let source = Arc::new(EndlessSource {
            entered: Notify::new(),
        });
        let queue = queue(source).await;
        queue.shutdown().await;

        assert!(matches!(
            queue.submit(request("root")).await,
            Err(SyncError::QueueClosed)
        ));
    }

    #[tokio::test]
    async fn test_idle_queue_has_nothing_to_cancel() {
        let source = Arc::new(EndlessSource {
            entered: Notify::new(),
        });
        let queue = queue(source).await;

        assert!(!queue.cancel_current().await);
        queue.shutdown().await;
    }
}
