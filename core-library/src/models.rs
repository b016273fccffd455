//! Domain models for the library index
//!
//! Track metadata as extracted from tags, and the in-memory tree snapshots
//! that crawls produce and the index store reconstructs.

use bridge_traits::source::Identifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// Track Metadata
// =============================================================================

/// Sparse tag metadata for one track.
///
/// Every field is optional; `None` (tag absent) is distinct from `Some("")`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
    /// Track name
    pub title: Option<String>,
    pub mime_type: Option<String>,
    /// Bits per second
    pub bitrate: Option<i64>,
    pub track_number: Option<i32>,
    pub disc_number: Option<i32>,
    /// 1 when the track is tagged as part of a compilation
    pub is_compilation: Option<i32>,
    pub duration_ms: Option<i64>,
}

impl TrackMetadata {
    /// Whether no tag at all was read
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Album artist, ignoring empty values
    pub fn album_artist_non_empty(&self) -> Option<&str> {
        self.album_artist.as_deref().filter(|v| !v.trim().is_empty())
    }

    pub fn with_album_artist(mut self, album_artist: impl Into<String>) -> Self {
        self.album_artist = Some(album_artist.into());
        self
    }
}

// =============================================================================
// Tree Snapshots
// =============================================================================

/// A `(id, parent)` placement, the comparison key for diffing.
pub type NodeKey = (Identifier, Identifier);

/// Track entry of a [`TreeSnapshot`].
///
/// `metadata` is `None` for tracks the crawl confirmed as unchanged without
/// re-extracting them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotTrack {
    pub id: Identifier,
    pub parent: Identifier,
    pub metadata: Option<TrackMetadata>,
}

impl SnapshotTrack {
    pub fn key(&self) -> NodeKey {
        (self.id.clone(), self.parent.clone())
    }
}

/// Point-in-time shape of one container and everything below it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub id: Identifier,
    pub parent: Identifier,
    pub tracks: Vec<SnapshotTrack>,
    pub containers: Vec<TreeSnapshot>,
}

impl TreeSnapshot {
    /// Snapshot of a container with no known children.
    pub fn empty(id: Identifier, parent: Identifier) -> Self {
        Self {
            id,
            parent,
            tracks: Vec::new(),
            containers: Vec::new(),
        }
    }

    pub fn key(&self) -> NodeKey {
        (self.id.clone(), self.parent.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty() && self.containers.is_empty()
    }

    /// Keys of the direct child tracks
    pub fn track_keys(&self) -> BTreeSet<NodeKey> {
        self.tracks.iter().map(SnapshotTrack::key).collect()
    }

    /// Keys of the direct child containers
    pub fn container_keys(&self) -> BTreeSet<NodeKey> {
        self.containers.iter().map(TreeSnapshot::key).collect()
    }

    /// Every container and track placement below (and including) this node.
    pub fn shape(&self) -> SnapshotShape {
        let mut shape = SnapshotShape::default();
        let mut pending = vec![self];

        while let Some(node) = pending.pop() {
            shape.containers.insert(node.key());
            shape.tracks.extend(node.tracks.iter().map(SnapshotTrack::key));
            pending.extend(node.containers.iter());
        }

        shape
    }

    /// Total number of tracks in the subtree
    pub fn track_count(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += node.tracks.len();
            pending.extend(node.containers.iter());
        }
        count
    }

    /// Find a track anywhere in the subtree
    pub fn find_track(&self, id: &Identifier) -> Option<&SnapshotTrack> {
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            if let Some(track) = node.tracks.iter().find(|t| &t.id == id) {
                return Some(track);
            }
            pending.extend(node.containers.iter());
        }
        None
    }
}

/// Flattened set of placements, used to compare snapshots structurally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotShape {
    pub containers: BTreeSet<NodeKey>,
    pub tracks: BTreeSet<NodeKey>,
}

/// Index of a node inside a [`SnapshotBuilder`].
pub type NodeIndex = usize;

struct PendingNode {
    id: Identifier,
    parent: Identifier,
    up: Option<NodeIndex>,
    tracks: Vec<SnapshotTrack>,
    children: Vec<NodeIndex>,
}

/// Incrementally assembles a [`TreeSnapshot`] without recursion.
///
/// Nodes live in an arena; a child is always added after its parent, so
/// [`build`](SnapshotBuilder::build) can fold the arena back to front.
pub struct SnapshotBuilder {
    nodes: Vec<PendingNode>,
}

impl SnapshotBuilder {
    /// Start a snapshot rooted at `(id, parent)`; the root is index `0`.
    pub fn new(id: Identifier, parent: Identifier) -> Self {
        Self {
            nodes: vec![PendingNode {
                id,
                parent,
                up: None,
                tracks: Vec::new(),
                children: Vec::new(),
            }],
        }
    }

    pub const ROOT: NodeIndex = 0;

    /// Identifier of an existing node
    pub fn id_of(&self, node: NodeIndex) -> &Identifier {
        &self.nodes[node].id
    }

    /// Whether `id` names `node` itself or one of its ancestors.
    ///
    /// A container may sit under several parents; only a repeat on the path
    /// from the root is a cycle.
    pub fn is_on_path(&self, node: NodeIndex, id: &Identifier) -> bool {
        let mut current = Some(node);
        while let Some(index) = current {
            if &self.nodes[index].id == id {
                return true;
            }
            current = self.nodes[index].up;
        }
        false
    }

    /// Add a child container below `parent`, returning its index.
    pub fn add_container(&mut self, parent: NodeIndex, id: Identifier) -> NodeIndex {
        let parent_id = self.nodes[parent].id.clone();
        let index = self.nodes.len();
        self.nodes.push(PendingNode {
            id,
            parent: parent_id,
            up: Some(parent),
            tracks: Vec::new(),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(index);
        index
    }

    pub fn push_track(&mut self, node: NodeIndex, track: SnapshotTrack) {
        self.nodes[node].tracks.push(track);
    }

    pub fn build(self) -> TreeSnapshot {
        let mut built: Vec<Option<TreeSnapshot>> = Vec::with_capacity(self.nodes.len());
        built.resize_with(self.nodes.len(), || None);

        for (index, node) in self.nodes.into_iter().enumerate().rev() {
            let containers = node
                .children
                .iter()
                .filter_map(|child| built[*child].take())
                .collect();
            built[index] = Some(TreeSnapshot {
                id: node.id,
                parent: node.parent,
                tracks: node.tracks,
                containers,
            });
        }

        built
            .into_iter()
            .next()
            .flatten()
            .unwrap_or_else(|| TreeSnapshot::empty(Identifier::none(), Identifier::none()))
    }
}
