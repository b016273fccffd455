//! # Repository Pattern Implementation
//!
//! Traits define the persistence interface the scan engine consumes; the
//! SQLite implementations use `sqlx` for async database access.
//!
//! ## Available Repositories
//!
//! - `IndexStore` - Persisted container/track placements of a library source

pub mod index_store;

pub use index_store::{IndexStore, SqliteIndexStore};
