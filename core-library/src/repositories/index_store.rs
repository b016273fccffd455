//! Index store trait and SQLite implementation
//!
//! The index store is the persisted record of every container and track
//! placement seen for a library source, keyed by `(uri, parent_uri)`. It is
//! the only writer of record; the scan engine mutates it exclusively through
//! [`IndexStore`].

use crate::error::{LibraryError, Result};
use crate::models::{NodeKey, SnapshotBuilder, SnapshotTrack, TrackMetadata, TreeSnapshot};
use async_trait::async_trait;
use bridge_traits::source::{Identifier, Track};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use sqlx::{FromRow, SqlitePool};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Index store interface consumed by the scan engine
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Reconstruct the last persisted shape below `(root, parent)`.
    ///
    /// An unknown root yields an empty snapshot rooted at `root`.
    async fn build_tree(&self, root: &Identifier, parent: &Identifier) -> Result<TreeSnapshot>;

    /// Whether the track's tags must be (re-)extracted this pass
    async fn track_needs_scan(&self, track: &Track) -> Result<bool>;

    /// Idempotent upsert of a container placement
    async fn insert_container(&self, id: &Identifier, parent: &Identifier) -> Result<()>;

    /// Idempotent upsert of a track and its metadata.
    ///
    /// # Returns
    /// - `Ok(true)` if the row was written
    /// - `Ok(false)` if the track was rejected (recoverable, per track)
    async fn insert_track(&self, track: &Track, metadata: &TrackMetadata) -> Result<bool>;

    /// Delete one track placement; no-op when absent
    async fn remove_track(&self, id: &Identifier, parent: &Identifier) -> Result<()>;

    /// Delete one container placement; no-op when absent.
    ///
    /// Once the container has no placement left, its tracks and child
    /// containers are removed as well.
    async fn remove_container(&self, id: &Identifier, parent: &Identifier) -> Result<()>;

    /// Previously known roots of `source_id`
    async fn find_top_level_containers(&self, source_id: &str) -> Result<Vec<NodeKey>>;

    /// Signal observers that the index changed
    async fn notify_observers(&self) -> Result<()>;
}

/// SQLite implementation of [`IndexStore`], scoped to one library source.
pub struct SqliteIndexStore {
    pool: SqlitePool,
    source_id: String,
    event_bus: Option<EventBus>,
}

#[derive(FromRow)]
struct ContainerRow {
    uri: String,
    parent_uri: String,
}

#[derive(FromRow)]
struct TrackRow {
    uri: String,
    parent_uri: String,
    album: Option<String>,
    album_artist: Option<String>,
    artist: Option<String>,
    genre: Option<String>,
    title: Option<String>,
    mime_type: Option<String>,
    bitrate: Option<i64>,
    track_number: Option<i32>,
    disc_number: Option<i32>,
    is_compilation: Option<i32>,
    duration_ms: Option<i64>,
}

impl From<TrackRow> for SnapshotTrack {
    fn from(row: TrackRow) -> Self {
        SnapshotTrack {
            id: Identifier::new(row.uri),
            parent: Identifier::new(row.parent_uri),
            metadata: Some(TrackMetadata {
                album: row.album,
                album_artist: row.album_artist,
                artist: row.artist,
                genre: row.genre,
                title: row.title,
                mime_type: row.mime_type,
                bitrate: row.bitrate,
                track_number: row.track_number,
                disc_number: row.disc_number,
                is_compilation: row.is_compilation,
                duration_ms: row.duration_ms,
            }),
        }
    }
}

impl SqliteIndexStore {
    pub fn new(pool: SqlitePool, source_id: impl Into<String>) -> Self {
        Self {
            pool,
            source_id: source_id.into(),
            event_bus: None,
        }
    }

    /// Publish [`LibraryEvent::IndexChanged`] on `bus` from `notify_observers`
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn require_id(field: &str, id: &Identifier) -> Result<()> {
        if id.is_none() {
            return Err(LibraryError::InvalidInput {
                field: field.to_string(),
                message: "identifier cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    async fn placement_exists(&self, id: &Identifier, parent: &Identifier) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM index_containers WHERE source_id = ? AND uri = ? AND parent_uri = ?",
        )
        .bind(&self.source_id)
        .bind(id.as_str())
        .bind(parent.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    /// Number of persisted track placements for this source
    pub async fn count_tracks(&self) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM index_tracks WHERE source_id = ?")
                .bind(&self.source_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

#[async_trait]
impl IndexStore for SqliteIndexStore {
    async fn build_tree(&self, root: &Identifier, parent: &Identifier) -> Result<TreeSnapshot> {
        if !self.placement_exists(root, parent).await? {
            debug!(root = %root, "Root not indexed yet, using empty snapshot");
            return Ok(TreeSnapshot::empty(root.clone(), parent.clone()));
        }

        let containers: Vec<ContainerRow> = sqlx::query_as(
            "SELECT uri, parent_uri FROM index_containers WHERE source_id = ? ORDER BY uri",
        )
        .bind(&self.source_id)
        .fetch_all(&self.pool)
        .await?;

        let tracks: Vec<TrackRow> = sqlx::query_as(
            r#"
            SELECT uri, parent_uri, album, album_artist, artist, genre, title, mime_type,
                   bitrate, track_number, disc_number, is_compilation, duration_ms
            FROM index_tracks
            WHERE source_id = ?
            ORDER BY uri
            "#,
        )
        .bind(&self.source_id)
        .fetch_all(&self.pool)
        .await?;

        let mut child_containers: HashMap<String, Vec<String>> = HashMap::new();
        for row in containers {
            child_containers
                .entry(row.parent_uri)
                .or_default()
                .push(row.uri);
        }

        let mut child_tracks: HashMap<String, Vec<SnapshotTrack>> = HashMap::new();
        for row in tracks {
            child_tracks
                .entry(row.parent_uri.clone())
                .or_default()
                .push(row.into());
        }

        let mut builder = SnapshotBuilder::new(root.clone(), parent.clone());
        let mut pending = vec![(SnapshotBuilder::ROOT, root.as_str().to_string())];

        while let Some((node, uri)) = pending.pop() {
            // A container placed under several parents shares its tracks
            for track in child_tracks.get(&uri).into_iter().flatten() {
                builder.push_track(node, track.clone());
            }

            let Some(children) = child_containers.get(&uri) else {
                continue;
            };
            for child in children {
                let child_id = Identifier::new(child.clone());
                if builder.is_on_path(node, &child_id) {
                    warn!(container = %child, "Container is its own ancestor, skipping");
                    continue;
                }
                let index = builder.add_container(node, child_id);
                pending.push((index, child.clone()));
            }
        }

        Ok(builder.build())
    }

    async fn track_needs_scan(&self, track: &Track) -> Result<bool> {
        let stored: Option<(Option<String>,)> = sqlx::query_as(
            "SELECT revision FROM index_tracks WHERE source_id = ? AND uri = ? AND parent_uri = ?",
        )
        .bind(&self.source_id)
        .bind(track.id.as_str())
        .bind(track.parent.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(match (stored, track.revision.as_deref()) {
            (Some((Some(stored),)), Some(current)) => stored != current,
            _ => true,
        })
    }

    async fn insert_container(&self, id: &Identifier, parent: &Identifier) -> Result<()> {
        Self::require_id("container.id", id)?;

        sqlx::query(
            r#"
            INSERT INTO index_containers (source_id, uri, parent_uri, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (source_id, uri, parent_uri) DO UPDATE SET
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.source_id)
        .bind(id.as_str())
        .bind(parent.as_str())
        .bind(Self::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_track(&self, track: &Track, metadata: &TrackMetadata) -> Result<bool> {
        if track.id.is_none() {
            warn!(parent = %track.parent, "Rejecting track without identifier");
            return Ok(false);
        }

        let resource = track.resources.first().map(|r| r.location.as_str());

        let result = sqlx::query(
            r#"
            INSERT INTO index_tracks (
                source_id, uri, parent_uri, revision, resource,
                album, album_artist, artist, genre, title, mime_type,
                bitrate, track_number, disc_number, is_compilation, duration_ms,
                updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (source_id, uri, parent_uri) DO UPDATE SET
                revision = excluded.revision,
                resource = excluded.resource,
                album = excluded.album,
                album_artist = excluded.album_artist,
                artist = excluded.artist,
                genre = excluded.genre,
                title = excluded.title,
                mime_type = excluded.mime_type,
                bitrate = excluded.bitrate,
                track_number = excluded.track_number,
                disc_number = excluded.disc_number,
                is_compilation = excluded.is_compilation,
                duration_ms = excluded.duration_ms,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.source_id)
        .bind(track.id.as_str())
        .bind(track.parent.as_str())
        .bind(track.revision.as_deref())
        .bind(resource)
        .bind(metadata.album.as_deref())
        .bind(metadata.album_artist.as_deref())
        .bind(metadata.artist.as_deref())
        .bind(metadata.genre.as_deref())
        .bind(metadata.title.as_deref())
        .bind(metadata.mime_type.as_deref())
        .bind(metadata.bitrate)
        .bind(metadata.track_number)
        .bind(metadata.disc_number)
        .bind(metadata.is_compilation)
        .bind(metadata.duration_ms)
        .bind(Self::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_track(&self, id: &Identifier, parent: &Identifier) -> Result<()> {
        sqlx::query("DELETE FROM index_tracks WHERE source_id = ? AND uri = ? AND parent_uri = ?")
            .bind(&self.source_id)
            .bind(id.as_str())
            .bind(parent.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_container(&self, id: &Identifier, parent: &Identifier) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM index_containers WHERE source_id = ? AND uri = ? AND parent_uri = ?",
        )
        .bind(&self.source_id)
        .bind(id.as_str())
        .bind(parent.as_str())
        .execute(&mut *tx)
        .await?;

        let mut visited = HashSet::new();
        let mut pending = vec![id.as_str().to_string()];

        while let Some(uri) = pending.pop() {
            if !visited.insert(uri.clone()) {
                continue;
            }

            let (remaining,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM index_containers WHERE source_id = ? AND uri = ?",
            )
            .bind(&self.source_id)
            .bind(&uri)
            .fetch_one(&mut *tx)
            .await?;
            if remaining > 0 {
                continue;
            }

            sqlx::query("DELETE FROM index_tracks WHERE source_id = ? AND parent_uri = ?")
                .bind(&self.source_id)
                .bind(&uri)
                .execute(&mut *tx)
                .await?;

            let children: Vec<(String,)> = sqlx::query_as(
                "SELECT uri FROM index_containers WHERE source_id = ? AND parent_uri = ?",
            )
            .bind(&self.source_id)
            .bind(&uri)
            .fetch_all(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM index_containers WHERE source_id = ? AND parent_uri = ?")
                .bind(&self.source_id)
                .bind(&uri)
                .execute(&mut *tx)
                .await?;

            pending.extend(children.into_iter().map(|(child,)| child));
        }

        tx.commit().await?;
        debug!(container = %id, cascaded = visited.len(), "Container removed");
        Ok(())
    }

    async fn find_top_level_containers(&self, source_id: &str) -> Result<Vec<NodeKey>> {
        let rows: Vec<ContainerRow> = sqlx::query_as(
            r#"
            SELECT c.uri, c.parent_uri
            FROM index_containers AS c
            WHERE c.source_id = ?
              AND (
                c.parent_uri = ''
                OR NOT EXISTS (
                    SELECT 1 FROM index_containers AS p
                    WHERE p.source_id = ? AND p.uri = c.parent_uri
                )
              )
            ORDER BY c.uri
            "#,
        )
        .bind(source_id)
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (Identifier::new(row.uri), Identifier::new(row.parent_uri)))
            .collect())
    }

    async fn notify_observers(&self) -> Result<()> {
        debug!(source_id = %self.source_id, "Notifying index observers");
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Library(LibraryEvent::IndexChanged {
                source_id: self.source_id.clone(),
            }))
            .ok();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use bridge_traits::source::Resource;

    fn id(value: &str) -> Identifier {
        Identifier::new(value)
    }

    fn track(uri: &str, parent: &str) -> Track {
        Track::new(uri, parent).with_resource(Resource::new(format!("/music/{}", uri)))
    }

    async fn store() -> SqliteIndexStore {
        SqliteIndexStore::new(create_test_pool().await.unwrap(), "local")
    }

    #[tokio::test]
    async fn test_build_tree_unknown_root_is_empty() {
        let store = store().await;
        let tree = store.build_tree(&id("r"), &Identifier::none()).await.unwrap();
        assert_eq!(tree, TreeSnapshot::empty(id("r"), Identifier::none()));
    }

    #[tokio::test]
    async fn test_build_tree_round_trips_shape_and_metadata() {
        let store = store().await;
        store.insert_container(&id("r"), &Identifier::none()).await.unwrap();
        store.insert_container(&id("d"), &id("r")).await.unwrap();
        let metadata = TrackMetadata {
            artist: Some("Jane".to_string()),
            track_number: Some(3),
            ..Default::default()
        };
        assert!(store.insert_track(&track("b", "d"), &metadata).await.unwrap());

        let tree = store.build_tree(&id("r"), &Identifier::none()).await.unwrap();

        assert_eq!(tree.containers.len(), 1);
        assert_eq!(tree.containers[0].key(), (id("d"), id("r")));
        let b = &tree.containers[0].tracks[0];
        assert_eq!(b.key(), (id("b"), id("d")));
        assert_eq!(b.metadata.as_ref(), Some(&metadata));
    }

    #[tokio::test]
    async fn test_upserts_are_idempotent() {
        let store = store().await;
        let t = track("a", "r");
        store.insert_container(&id("r"), &Identifier::none()).await.unwrap();
        store.insert_container(&id("r"), &Identifier::none()).await.unwrap();
        store.insert_track(&t, &TrackMetadata::default()).await.unwrap();
        let updated = TrackMetadata {
            title: Some("New".to_string()),
            ..Default::default()
        };
        store.insert_track(&t, &updated).await.unwrap();

        assert_eq!(store.count_tracks().await.unwrap(), 1);
        let tree = store.build_tree(&id("r"), &Identifier::none()).await.unwrap();
        assert_eq!(tree.tracks[0].metadata.as_ref().unwrap().title.as_deref(), Some("New"));
    }

    #[tokio::test]
    async fn test_insert_track_without_id_is_rejected() {
        let store = store().await;
        let rejected = Track::new(Identifier::none(), "r");
        assert!(!store
            .insert_track(&rejected, &TrackMetadata::default())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_insert_container_without_id_is_invalid() {
        let store = store().await;
        let err = store
            .insert_container(&Identifier::none(), &id("r"))
            .await
            .unwrap_err();
        assert!(matches!(err, LibraryError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_track_needs_scan_follows_revision() {
        let store = store().await;
        let unseen = track("a", "r").with_revision("v1");
        assert!(store.track_needs_scan(&unseen).await.unwrap());

        store.insert_track(&unseen, &TrackMetadata::default()).await.unwrap();
        assert!(!store.track_needs_scan(&unseen).await.unwrap());

        let changed = track("a", "r").with_revision("v2");
        assert!(store.track_needs_scan(&changed).await.unwrap());

        let unversioned = track("a", "r");
        assert!(store.track_needs_scan(&unversioned).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_is_noop_when_absent() {
        let store = store().await;
        store.remove_track(&id("x"), &id("r")).await.unwrap();
        store.remove_container(&id("x"), &id("r")).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_container_cascades() {
        let store = store().await;
        store.insert_container(&id("r"), &Identifier::none()).await.unwrap();
        store.insert_container(&id("d"), &id("r")).await.unwrap();
        store.insert_container(&id("e"), &id("d")).await.unwrap();
        store.insert_track(&track("b", "d"), &TrackMetadata::default()).await.unwrap();
        store.insert_track(&track("c", "e"), &TrackMetadata::default()).await.unwrap();
        store.insert_track(&track("a", "r"), &TrackMetadata::default()).await.unwrap();

        store.remove_container(&id("d"), &id("r")).await.unwrap();

        let tree = store.build_tree(&id("r"), &Identifier::none()).await.unwrap();
        assert!(tree.containers.is_empty());
        assert_eq!(tree.track_keys().len(), 1);
        assert_eq!(store.count_tracks().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_container_keeps_other_placement() {
        let store = store().await;
        store.insert_container(&id("r"), &Identifier::none()).await.unwrap();
        store.insert_container(&id("old"), &id("r")).await.unwrap();
        store.insert_container(&id("new"), &id("r")).await.unwrap();
        store.insert_container(&id("d"), &id("old")).await.unwrap();
        store.insert_container(&id("d"), &id("new")).await.unwrap();
        store.insert_track(&track("b", "d"), &TrackMetadata::default()).await.unwrap();

        store.remove_container(&id("d"), &id("old")).await.unwrap();

        assert_eq!(store.count_tracks().await.unwrap(), 1);
        let tree = store.build_tree(&id("new"), &id("r")).await.unwrap();
        assert_eq!(tree.containers[0].key(), (id("d"), id("new")));
    }

    #[tokio::test]
    async fn test_find_top_level_containers() {
        let store = store().await;
        store.insert_container(&id("r1"), &Identifier::none()).await.unwrap();
        store.insert_container(&id("d"), &id("r1")).await.unwrap();
        store.insert_container(&id("r2"), &id("outside")).await.unwrap();

        let other = SqliteIndexStore::new(store.pool.clone(), "remote");
        other.insert_container(&id("z"), &Identifier::none()).await.unwrap();

        let roots = store.find_top_level_containers("local").await.unwrap();
        assert_eq!(
            roots,
            vec![(id("r1"), Identifier::none()), (id("r2"), id("outside"))]
        );
    }

    #[tokio::test]
    async fn test_notify_observers_emits_index_changed() {
        let bus = EventBus::new(8);
        let mut events = bus.subscribe();
        let store = SqliteIndexStore::new(create_test_pool().await.unwrap(), "local")
            .with_event_bus(bus.clone());

        store.notify_observers().await.unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Library(LibraryEvent::IndexChanged {
                source_id: "local".to_string()
            })
        );
    }
}
