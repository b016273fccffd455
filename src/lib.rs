//! Workspace umbrella crate.
//!
//! Re-exports the `core-service` façade so host applications can depend on
//! `library-indexer-workspace` and enable the documented features without
//! wiring each crate individually.
//!
//! ## Features
//!
//! - `desktop-shims` (default): local folder source, `reqwest` HTTP client
//!   and TCP-probe network monitor from `bridge-desktop`

pub use core_service::*;
