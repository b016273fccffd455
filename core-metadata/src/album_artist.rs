//! Album-artist backfill for one container's freshly extracted tracks.
//!
//! Many rips tag only the track artist. When every track in a folder shares
//! one primary artist, that artist becomes the album artist of the whole
//! batch so the album groups together.

use core_library::models::TrackMetadata;
use std::collections::BTreeSet;
use tracing::debug;

use crate::text::primary_artist;

/// Reconcile album artists across a batch of `(track, metadata)` pairs.
///
/// Backfill happens only when at least one track lacks a non-empty album
/// artist and the batch has exactly one distinct primary artist (featured
/// artists stripped). It then overwrites the album artist of every track,
/// including tracks that already carried one. Otherwise the batch is
/// returned unchanged.
pub fn reconcile_album_artist<T>(batch: Vec<(T, TrackMetadata)>) -> Vec<(T, TrackMetadata)> {
    let tagged = batch
        .iter()
        .filter(|(_, metadata)| metadata.album_artist_non_empty().is_some())
        .count();

    let artists: BTreeSet<String> = batch
        .iter()
        .filter_map(|(_, metadata)| metadata.artist.as_deref())
        .filter_map(primary_artist)
        .collect();

    if tagged >= batch.len() || artists.len() != 1 {
        return batch;
    }

    let Some(artist) = artists.into_iter().next() else {
        return batch;
    };

    debug!(
        album_artist = %artist,
        tracks = batch.len(),
        tagged,
        "Backfilling album artist"
    );

    batch
        .into_iter()
        .map(|(track, metadata)| (track, metadata.with_album_artist(artist.clone())))
        .collect()
}
