//! # Library Index Module
//!
//! Owns the persisted library index and the models shared by the scan engine.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite connection pool and embedded migrations
//! - Track metadata and tree snapshot models
//! - The `IndexStore` interface and its SQLite implementation

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use models::{NodeKey, SnapshotBuilder, SnapshotShape, SnapshotTrack, TrackMetadata, TreeSnapshot};
pub use repositories::{IndexStore, SqliteIndexStore};
