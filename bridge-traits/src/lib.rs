//! # Host Bridge Traits
//!
//! Abstractions the indexing engine needs from its host.
//!
//! ## Traits
//!
//! ### Library content
//! - [`LibrarySource`](source::LibrarySource) - Answers "children of container" queries
//! - [`ContentResolver`](source::ContentResolver) - Opens host-managed `content://` handles
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Fetches remote resources with their headers
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity guard for network-backed sources
//!
//! ### Utilities
//! - [`LoggerSink`](logger::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it with actionable messages.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared across the
//! scan worker and the rest of the application.

pub mod error;
pub mod http;
pub mod logger;
pub mod network;
pub mod source;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use logger::{LogEntry, LogLevel, LoggerSink};
pub use network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
pub use source::{
    ChildListing, Container, ContentResolver, Identifier, LibrarySource, Resource, ResourceKind,
    Track,
};
