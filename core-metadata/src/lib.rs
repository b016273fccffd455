//! # Metadata Module
//!
//! Reads tags from track resources and reconciles album artists per container.
//!
//! ## Overview
//!
//! This module handles:
//! - Audio tag extraction (ID3, Vorbis, MP4, FLAC, RIFF) from local files,
//!   host content handles and remote URLs
//! - Text cleanup of free-form tags (mojibake repair, whitespace)
//! - Album-artist backfill for containers whose tracks share one artist

pub mod album_artist;
pub mod error;
pub mod extractor;
pub mod text;

pub use album_artist::reconcile_album_artist;
pub use error::{MetadataError, Result};
pub use extractor::{Extractor, MetadataExtractor};
