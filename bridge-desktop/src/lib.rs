//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `LibrarySource` over local directories using `tokio::fs`
//! - `HttpClient` using `reqwest`, for remote track resources
//! - `NetworkMonitor` using a TCP reachability probe
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{LocalFolderSource, ReqwestHttpClient};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let source = LocalFolderSource::new("local");
//!     let http_client = ReqwestHttpClient::try_new()?;
//!
//!     // Use in core configuration
//!     Ok(())
//! }
//! ```

mod folder_source;
mod http;
mod network;

pub use folder_source::{LocalFolderSource, AUDIO_EXTENSIONS};
pub use http::ReqwestHttpClient;
pub use network::DesktopNetworkMonitor;
