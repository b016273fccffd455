//! # Content Crawler
//!
//! Walks a library source depth-first from one root, committing what it
//! finds to the index and assembling the in-memory snapshot of the pass.
//!
//! The walk uses an explicit stack of pending containers, so tree depth is
//! bounded by memory rather than the call stack, and cancellation is checked
//! between container visits. Exactly one children query is outstanding at a
//! time.

use crate::job::ScanCounters;
use crate::metadata_processor::TrackProcessor;
use crate::progress::ProgressReporter;
use crate::SyncError;
use bridge_traits::source::{ChildListing, Identifier, LibrarySource};
use core_library::models::{NodeIndex, SnapshotBuilder, TreeSnapshot};
use core_library::IndexStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Result of crawling one root
#[derive(Debug)]
pub struct CrawlOutcome {
    pub snapshot: TreeSnapshot,
    /// The walk stopped early; `snapshot` is partial
    pub cancelled: bool,
    pub containers_visited: u64,
}

/// Depth-first crawler over one [`LibrarySource`]
pub struct Crawler {
    source: Arc<dyn LibrarySource>,
    store: Arc<dyn IndexStore>,
    processor: TrackProcessor,
    list_timeout: Duration,
}

impl Crawler {
    pub fn new(
        source: Arc<dyn LibrarySource>,
        store: Arc<dyn IndexStore>,
        processor: TrackProcessor,
        list_timeout: Duration,
    ) -> Self {
        Self {
            source,
            store,
            processor,
            list_timeout,
        }
    }

    /// Crawl the subtree rooted at `(root, parent)`.
    ///
    /// Each container is committed before its tracks, and its tracks before
    /// any child container is visited. Source errors and timeouts leave the
    /// affected container empty in the snapshot.
    pub async fn crawl(
        &self,
        root: &Identifier,
        parent: &Identifier,
        token: &CancellationToken,
        counters: &mut ScanCounters,
        progress: &mut ProgressReporter,
    ) -> CrawlOutcome {
        let mut builder = SnapshotBuilder::new(root.clone(), parent.clone());
        let mut pending: Vec<NodeIndex> = vec![SnapshotBuilder::ROOT];
        let mut containers_visited = 0;
        let mut cancelled = false;

        if let Err(e) = self.store.insert_container(root, parent).await {
            warn!(container = %root, error = %e, "Failed to persist root container");
        }

        while let Some(node) = pending.pop() {
            if token.is_cancelled() {
                debug!(root = %root, "Crawl cancelled");
                cancelled = true;
                break;
            }

            let container = builder.id_of(node).clone();
            let listing = self.list_children(&container).await;
            containers_visited += 1;

            let tracks = self
                .processor
                .process_container(&container, listing.tracks, counters)
                .await;
            for track in tracks {
                builder.push_track(node, track);
            }
            progress.report(counters);

            let mut children = Vec::with_capacity(listing.containers.len());
            for child in listing.containers {
                if child.id.is_none() {
                    warn!(parent = %container, "Skipping container without identifier");
                    continue;
                }
                if builder.is_on_path(node, &child.id) {
                    warn!(container = %child.id, parent = %container, "Container is its own ancestor, skipping");
                    continue;
                }
                if let Err(e) = self.store.insert_container(&child.id, &container).await {
                    warn!(container = %child.id, error = %e, "Failed to persist container");
                }
                children.push(builder.add_container(node, child.id));
            }

            // Reverse so the first listed child is visited first
            pending.extend(children.into_iter().rev());
        }

        CrawlOutcome {
            snapshot: builder.build(),
            cancelled,
            containers_visited,
        }
    }

    async fn list_children(&self, container: &Identifier) -> ChildListing {
        match timeout(self.list_timeout, self.source.list_children(container)).await {
            Ok(Ok(listing)) => listing,
            Ok(Err(e)) => {
                warn!(container = %container, error = %e, "Listing children failed, treating as empty");
                ChildListing::empty()
            }
            Err(_) => {
                let error = SyncError::Timeout(self.list_timeout.as_secs());
                warn!(container = %container, error = %error, "Listing children timed out, treating as empty");
                ChildListing::empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::ScanJobId;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::source::{Container, Resource, Track};
    use core_library::db::create_test_pool;
    use core_library::models::TrackMetadata;
    use core_library::SqliteIndexStore;
    use core_metadata::{Extractor, Result as MetadataResult};
    use core_runtime::events::EventBus;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    struct FixedExtractor;

    #[async_trait]
    impl Extractor for FixedExtractor {
        async fn extract(&self, _resource: &Resource) -> MetadataResult<TrackMetadata> {
            Ok(TrackMetadata::default())
        }
    }

    #[derive(Default)]
    struct TreeSource {
        children: HashMap<String, ChildListing>,
        failing: HashSet<String>,
        slow: HashSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl TreeSource {
        fn with_children(mut self, id: &str, tracks: &[&str], containers: &[&str]) -> Self {
            let listing = ChildListing {
                tracks: tracks
                    .iter()
                    .map(|t| Track::new(*t, id).with_resource(Resource::new(format!("/{}", t))))
                    .collect(),
                containers: containers.iter().map(|c| Container::new(*c, id)).collect(),
            };
            self.children.insert(id.to_string(), listing);
            self
        }
    }

    #[async_trait]
    impl LibrarySource for TreeSource {
        fn source_id(&self) -> &str {
            "test"
        }

        async fn list_children(&self, container: &Identifier) -> BridgeResult<ChildListing> {
            self.calls.lock().unwrap().push(container.as_str().to_string());
            if self.slow.contains(container.as_str()) {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            if self.failing.contains(container.as_str()) {
                return Err(BridgeError::OperationFailed("listing failed".to_string()));
            }
            Ok(self
                .children
                .get(container.as_str())
                .cloned()
                .unwrap_or_default())
        }
    }

    async fn crawler(source: Arc<TreeSource>) -> (Crawler, Arc<SqliteIndexStore>) {
        let store = Arc::new(SqliteIndexStore::new(create_test_pool().await.unwrap(), "test"));
        let processor = TrackProcessor::new(store.clone(), Arc::new(FixedExtractor));
        let crawler = Crawler::new(source, store.clone(), processor, Duration::from_millis(200));
        (crawler, store)
    }

    fn reporter() -> ProgressReporter {
        ProgressReporter::new(EventBus::new(16), ScanJobId::new(), Duration::ZERO)
    }

    fn id(value: &str) -> Identifier {
        Identifier::new(value)
    }

    #[tokio::test]
    async fn test_crawl_builds_snapshot_depth_first() {
        let source = Arc::new(
            TreeSource::default()
                .with_children("r", &["a"], &["d", "f"])
                .with_children("d", &["b"], &["e"])
                .with_children("e", &["c"], &[]),
        );
        let (crawler, store) = crawler(source.clone()).await;
        let mut counters = ScanCounters::default();

        let outcome = crawler
            .crawl(
                &id("r"),
                &Identifier::none(),
                &CancellationToken::new(),
                &mut counters,
                &mut reporter(),
            )
            .await;

        assert!(!outcome.cancelled);
        assert_eq!(outcome.containers_visited, 4);
        assert_eq!(
            *source.calls.lock().unwrap(),
            vec!["r", "d", "e", "f"]
        );
        assert_eq!(counters.total, 3);
        assert_eq!(counters.processed, 3);

        let shape = outcome.snapshot.shape();
        assert!(shape.tracks.contains(&(id("c"), id("e"))));
        assert!(shape.containers.contains(&(id("f"), id("r"))));

        let stored = store.build_tree(&id("r"), &Identifier::none()).await.unwrap();
        assert_eq!(stored.shape(), shape);
    }

    #[tokio::test]
    async fn test_failed_listing_is_empty() {
        let mut source = TreeSource::default()
            .with_children("r", &["a"], &["d"])
            .with_children("d", &["b"], &[]);
        source.failing.insert("d".to_string());
        let (crawler, _) = crawler(Arc::new(source)).await;
        let mut counters = ScanCounters::default();

        let outcome = crawler
            .crawl(
                &id("r"),
                &Identifier::none(),
                &CancellationToken::new(),
                &mut counters,
                &mut reporter(),
            )
            .await;

        assert_eq!(counters.total, 1);
        assert!(outcome.snapshot.containers[0].is_empty());
    }

    #[tokio::test]
    async fn test_slow_listing_times_out() {
        let mut source = TreeSource::default()
            .with_children("r", &[], &["d"])
            .with_children("d", &["b"], &[]);
        source.slow.insert("d".to_string());
        let (crawler, _) = crawler(Arc::new(source)).await;
        let mut counters = ScanCounters::default();

        let outcome = crawler
            .crawl(
                &id("r"),
                &Identifier::none(),
                &CancellationToken::new(),
                &mut counters,
                &mut reporter(),
            )
            .await;

        assert_eq!(counters.total, 0);
        assert_eq!(outcome.snapshot.containers.len(), 1);
        assert!(outcome.snapshot.containers[0].is_empty());
    }

    #[tokio::test]
    async fn test_cycles_are_skipped() {
        let source = Arc::new(
            TreeSource::default()
                .with_children("r", &[], &["d"])
                .with_children("d", &["b"], &["r", "d"]),
        );
        let (crawler, _) = crawler(source.clone()).await;
        let mut counters = ScanCounters::default();

        let outcome = crawler
            .crawl(
                &id("r"),
                &Identifier::none(),
                &CancellationToken::new(),
                &mut counters,
                &mut reporter(),
            )
            .await;

        assert_eq!(outcome.containers_visited, 2);
        assert_eq!(source.calls.lock().unwrap().len(), 2);
        assert_eq!(counters.total, 1);
    }

    #[tokio::test]
    async fn test_container_under_two_parents_is_crawled_twice() {
        let source = Arc::new(
            TreeSource::default()
                .with_children("r", &[], &["a", "b"])
                .with_children("a", &[], &["x"])
                .with_children("b", &[], &["x"])
                .with_children("x", &["t"], &[]),
        );
        let (crawler, store) = crawler(source.clone()).await;
        let mut counters = ScanCounters::default();

        let outcome = crawler
            .crawl(
                &id("r"),
                &Identifier::none(),
                &CancellationToken::new(),
                &mut counters,
                &mut reporter(),
            )
            .await;

        assert_eq!(
            *source.calls.lock().unwrap(),
            vec!["r", "a", "x", "b", "x"]
        );
        let shape = outcome.snapshot.shape();
        assert!(shape.containers.contains(&(id("x"), id("a"))));
        assert!(shape.containers.contains(&(id("x"), id("b"))));
        assert!(shape.tracks.contains(&(id("t"), id("x"))));

        let stored = store.build_tree(&id("r"), &Identifier::none()).await.unwrap();
        assert_eq!(stored.shape(), shape);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let source = Arc::new(TreeSource::default().with_children("r", &["a"], &[]));
        let (crawler, _) = crawler(source.clone()).await;
        let token = CancellationToken::new();
        token.cancel();
        let mut counters = ScanCounters::default();

        let outcome = crawler
            .crawl(&id("r"), &Identifier::none(), &token, &mut counters, &mut reporter())
            .await;

        assert!(outcome.cancelled);
        assert!(source.calls.lock().unwrap().is_empty());
        assert_eq!(counters.total, 0);
    }

    #[tokio::test]
    async fn test_tracks_keyed_under_listing_container() {
        let mut source = TreeSource::default();
        source.children.insert(
            "r".to_string(),
            ChildListing {
                tracks: vec![Track::new("a", "elsewhere").with_resource(Resource::new("/a"))],
                containers: Vec::new(),
            },
        );
        let (crawler, _) = crawler(Arc::new(source)).await;
        let mut counters = ScanCounters::default();

        let outcome = crawler
            .crawl(
                &id("r"),
                &Identifier::none(),
                &CancellationToken::new(),
                &mut counters,
                &mut reporter(),
            )
            .await;

        assert_eq!(outcome.snapshot.tracks[0].parent, id("r"));
    }
}
