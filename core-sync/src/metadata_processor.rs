//! # Track Processor
//!
//! Handles the tracks one container listed: skip-or-extract, album-artist
//! reconciliation, then persistence.
//!
//! ## Workflow
//!
//! 1. Every listed track counts towards `total`
//! 2. Tracks the index already holds at the same revision are confirmed
//!    without extraction and count as processed
//! 3. The rest are extracted; failures count as errored and are dropped
//! 4. Extracted tracks go through [`reconcile_album_artist`] as one batch
//! 5. Each reconciled track is upserted; a rejected write counts as errored
//!
//! Only tracks that end up persisted (or confirmed) are returned for the
//! crawl snapshot.

use crate::job::ScanCounters;
use bridge_traits::source::{Identifier, Track};
use core_library::models::{SnapshotTrack, TrackMetadata};
use core_library::IndexStore;
use core_metadata::{reconcile_album_artist, Extractor};
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-container track pipeline
pub struct TrackProcessor {
    store: Arc<dyn IndexStore>,
    extractor: Arc<dyn Extractor>,
}

impl TrackProcessor {
    pub fn new(store: Arc<dyn IndexStore>, extractor: Arc<dyn Extractor>) -> Self {
        Self { store, extractor }
    }

    /// Process the tracks listed under `container`.
    ///
    /// Tracks are keyed under `container` whatever parent the source
    /// reported. Failures are counted, never returned.
    pub async fn process_container(
        &self,
        container: &Identifier,
        tracks: Vec<Track>,
        counters: &mut ScanCounters,
    ) -> Vec<SnapshotTrack> {
        let mut confirmed = Vec::new();
        let mut extracted: Vec<(Track, TrackMetadata)> = Vec::new();

        for mut track in tracks {
            counters.record_seen();
            track.parent = container.clone();

            let needs_scan = match self.store.track_needs_scan(&track).await {
                Ok(needs_scan) => needs_scan,
                Err(e) => {
                    warn!(track = %track.id, error = %e, "Revision lookup failed, re-extracting");
                    true
                }
            };

            if !needs_scan {
                debug!(track = %track.id, "Track unchanged, skipping extraction");
                counters.record_processed();
                confirmed.push(SnapshotTrack {
                    id: track.id,
                    parent: track.parent,
                    metadata: None,
                });
                continue;
            }

            match self.extractor.extract_track(&track).await {
                Ok(metadata) => extracted.push((track, metadata)),
                Err(e) => {
                    warn!(track = %track.id, error = %e, "Metadata extraction failed");
                    counters.record_errored();
                }
            }
        }

        for (track, metadata) in reconcile_album_artist(extracted) {
            match self.store.insert_track(&track, &metadata).await {
                Ok(true) => {
                    counters.record_processed();
                    confirmed.push(SnapshotTrack {
                        id: track.id,
                        parent: track.parent,
                        metadata: Some(metadata),
                    });
                }
                Ok(false) => {
                    warn!(track = %track.id, "Index rejected track");
                    counters.record_errored();
                }
                Err(e) => {
                    warn!(track = %track.id, error = %e, "Failed to persist track");
                    counters.record_errored();
                }
            }
        }

        confirmed
    }
}
