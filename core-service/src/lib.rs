//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (library source,
//! HTTP, content resolver, network monitor) and a [`CoreConfig`] into a
//! running indexing engine: the SQLite index, the metadata extractor, the
//! scan coordinator and its sequential queue. Desktop apps typically enable
//! the `desktop-shims` feature, which provides `LocalFolderSource`,
//! `ReqwestHttpClient` and `DesktopNetworkMonitor` from `bridge-desktop`.
//!
//! ```ignore
//! use core_service::CoreService;
//! use core_runtime::config::CoreConfig;
//! use core_sync::ScanConfig;
//!
//! let config = CoreConfig::builder().database_path("library-index.db").build()?;
//! let core = CoreService::bootstrap(config, source, ScanConfig::default()).await?;
//! let report = core.rescan_all().await?;
//! core.shutdown().await;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::source::{Identifier, LibrarySource};
use core_library::db::{create_pool, DatabaseConfig};
use core_library::{IndexStore, SqliteIndexStore};
use core_metadata::MetadataExtractor;
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream};
use core_sync::{ScanConfig, ScanCoordinator, ScanQueue, ScanReport, ScanRequest, ScanTicket};
use tracing::info;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::{DesktopNetworkMonitor, LocalFolderSource, ReqwestHttpClient};

/// Primary façade exposed to host applications.
///
/// Owns one library source's index and scan worker. Scans submitted through
/// the service run one at a time, in order.
pub struct CoreService {
    config: CoreConfig,
    event_bus: EventBus,
    store: Arc<SqliteIndexStore>,
    coordinator: Arc<ScanCoordinator>,
    queue: ScanQueue,
}

impl CoreService {
    /// Open the index database and start the scan worker for `source`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Library`] when the database cannot be opened or
    /// migrated.
    pub async fn bootstrap(
        config: CoreConfig,
        source: Arc<dyn LibrarySource>,
        scan_config: ScanConfig,
    ) -> Result<Self> {
        let event_bus = EventBus::new(config.event_buffer_size);
        let pool = create_pool(DatabaseConfig::new(&config.database_path)).await?;
        let store = Arc::new(
            SqliteIndexStore::new(pool, source.source_id()).with_event_bus(event_bus.clone()),
        );

        let mut extractor = MetadataExtractor::new();
        if let Some(client) = &config.http_client {
            extractor = extractor.with_http_client(client.clone());
        }
        if let Some(resolver) = &config.content_resolver {
            extractor = extractor.with_content_resolver(resolver.clone());
        }

        let queue_capacity = scan_config.queue_capacity;
        let mut coordinator = ScanCoordinator::new(
            scan_config,
            source,
            store.clone(),
            Arc::new(extractor),
            event_bus.clone(),
        );
        if config.features.enable_network_awareness {
            if let Some(monitor) = &config.network_monitor {
                coordinator = coordinator.with_network_monitor(monitor.clone());
            }
        }

        let coordinator = Arc::new(coordinator);
        let queue = ScanQueue::spawn(coordinator.clone(), queue_capacity);

        info!(
            source_id = %coordinator.source_id(),
            database = ?config.database_path,
            "Core service started"
        );

        Ok(Self {
            config,
            event_bus,
            store,
            coordinator,
            queue,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn source_id(&self) -> &str {
        self.coordinator.source_id()
    }

    /// Stream of scan and library events
    pub fn events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    /// The persisted index, for browsing
    pub fn index(&self) -> Arc<dyn IndexStore> {
        self.store.clone()
    }

    /// Number of indexed tracks
    pub async fn track_count(&self) -> Result<i64> {
        Ok(self.store.count_tracks().await?)
    }

    /// Queue a request without waiting for it
    pub async fn submit(&self, request: ScanRequest) -> Result<ScanTicket> {
        Ok(self.queue.submit(request).await?)
    }

    /// Queue a request and wait for its report
    pub async fn scan(&self, request: ScanRequest) -> Result<ScanReport> {
        Ok(self.queue.scan(request).await?)
    }

    /// Scan one top-level container (first scan of a new root)
    pub async fn scan_root(&self, container: Identifier) -> Result<ScanReport> {
        self.scan(ScanRequest::ScanDefault {
            container,
            parent: Identifier::none(),
        })
        .await
    }

    /// Rescan every indexed root of this source
    pub async fn rescan_all(&self) -> Result<ScanReport> {
        self.scan(ScanRequest::RescanAll {
            source_id: self.source_id().to_string(),
        })
        .await
    }

    /// Cancel the running scan; returns whether one was running
    pub async fn cancel_scan(&self) -> bool {
        self.queue.cancel_current().await
    }

    /// Stop the scan worker. Queued requests fail with `QueueClosed`.
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::source::ChildListing;
    use core_runtime::events::{CoreEvent, LibraryEvent};
    use core_sync::ScanOutcome;

    struct EmptySource;

    #[async_trait]
    impl LibrarySource for EmptySource {
        fn source_id(&self) -> &str {
            "empty"
        }

        async fn list_children(&self, _container: &Identifier) -> BridgeResult<ChildListing> {
            Ok(ChildListing::empty())
        }
    }

    fn config() -> CoreConfig {
        CoreConfig::builder()
            .database_path(":memory:")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_bootstrap_and_scan() {
        let core = CoreService::bootstrap(config(), Arc::new(EmptySource), ScanConfig::default())
            .await
            .unwrap();
        let mut events = core.events();

        let report = core.scan_root(Identifier::new("/music")).await.unwrap();
        assert_eq!(report.outcome, ScanOutcome::Completed);
        assert_eq!(report.source_id, "empty");
        assert_eq!(core.track_count().await.unwrap(), 0);

        let roots = core.index().find_top_level_containers("empty").await.unwrap();
        assert_eq!(roots, vec![(Identifier::new("/music"), Identifier::none())]);

        let mut index_changed = false;
        while let Some(Ok(event)) = events.try_recv() {
            if matches!(event, CoreEvent::Library(LibraryEvent::IndexChanged { .. })) {
                index_changed = true;
            }
        }
        assert!(index_changed);

        core.shutdown().await;
    }

    #[tokio::test]
    async fn test_rescan_all_with_nothing_indexed() {
        let core = CoreService::bootstrap(config(), Arc::new(EmptySource), ScanConfig::default())
            .await
            .unwrap();

        let report = core.rescan_all().await.unwrap();
        assert_eq!(report.outcome, ScanOutcome::Completed);
        assert_eq!(report.counters.total, 0);
        assert!(!core.cancel_scan().await);

        core.shutdown().await;
    }

    #[tokio::test]
    async fn test_scan_after_shutdown_fails() {
        let core = CoreService::bootstrap(config(), Arc::new(EmptySource), ScanConfig::default())
            .await
            .unwrap();
        core.shutdown().await;

        let result = core.rescan_all().await;
        assert!(matches!(
            result,
            Err(CoreError::Sync(core_sync::SyncError::QueueClosed))
        ));
    }
}
