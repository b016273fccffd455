//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the library indexer:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus used for scan progress and index-change notifications

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
