//! # Tree Differ
//!
//! Removes index entries that a fresh crawl no longer saw.
//!
//! Compares the snapshot loaded before a crawl with the snapshot the crawl
//! produced, by `(id, parent)` placement only. Content changes are handled
//! by the upsert during the crawl, not here.

use core_library::models::{NodeKey, TreeSnapshot};
use core_library::IndexStore;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Removal statistics of one or more diffs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub tracks_removed: u64,
    /// Directly removed containers; cascaded descendants are not counted
    pub containers_removed: u64,
    pub failed_removals: u64,
}

impl DiffStats {
    pub fn merge(&mut self, other: DiffStats) {
        self.tracks_removed += other.tracks_removed;
        self.containers_removed += other.containers_removed;
        self.failed_removals += other.failed_removals;
    }
}

pub struct TreeDiffer {
    store: Arc<dyn IndexStore>,
}

impl TreeDiffer {
    pub fn new(store: Arc<dyn IndexStore>) -> Self {
        Self { store }
    }

    /// Delete every placement of `before` that `after` does not contain.
    ///
    /// A pair of nodes with different ids is logged and skipped, subtree
    /// included. Removal errors are logged and counted; the diff continues.
    pub async fn remove_stale(&self, before: &TreeSnapshot, after: &TreeSnapshot) -> DiffStats {
        let mut stats = DiffStats::default();
        let mut pending = vec![(before, after)];

        while let Some((before, after)) = pending.pop() {
            if before.id != after.id {
                warn!(
                    before = %before.id,
                    after = %after.id,
                    "Snapshot roots differ, skipping subtree"
                );
                continue;
            }

            let kept_tracks = after.track_keys();
            for track in &before.tracks {
                if kept_tracks.contains(&track.key()) {
                    continue;
                }
                debug!(track = %track.id, parent = %track.parent, "Removing stale track");
                match self.store.remove_track(&track.id, &track.parent).await {
                    Ok(()) => stats.tracks_removed += 1,
                    Err(e) => {
                        warn!(track = %track.id, error = %e, "Failed to remove stale track");
                        stats.failed_removals += 1;
                    }
                }
            }

            let kept_containers: HashMap<NodeKey, &TreeSnapshot> = after
                .containers
                .iter()
                .map(|child| (child.key(), child))
                .collect();
            let mut seen: HashSet<NodeKey> = HashSet::new();

            for child in &before.containers {
                let key = child.key();
                if !seen.insert(key.clone()) {
                    continue;
                }

                match kept_containers.get(&key) {
                    Some(fresh) => pending.push((child, *fresh)),
                    None => {
                        debug!(container = %child.id, parent = %child.parent, "Removing stale container");
                        match self.store.remove_container(&child.id, &child.parent).await {
                            Ok(()) => stats.containers_removed += 1,
                            Err(e) => {
                                warn!(container = %child.id, error = %e, "Failed to remove stale container");
                                stats.failed_removals += 1;
                            }
                        }
                    }
                }
            }
        }

        stats
    }
}
