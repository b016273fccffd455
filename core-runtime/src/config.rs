//! # Core Configuration Module
//!
//! Builder-based configuration for the indexing engine.
//!
//! ## Overview
//!
//! [`CoreConfig`] holds the index database location, the host bridges the
//! metadata extractor and scan orchestrator need, and feature flags. The
//! builder validates fail-fast: enabling a feature without the bridge it needs
//! is a [`Error::CapabilityMissing`] at build time, not a scan-time surprise.
//!
//! ## Bridges
//!
//! - `HttpClient` - needed to extract tags from `http(s)://` resources
//! - `ContentResolver` - needed to extract tags from `content://` handles
//! - `NetworkMonitor` - needed for the pre-scan connectivity guard
//!
//! With the `desktop-shims` feature, `ReqwestHttpClient` and
//! `DesktopNetworkMonitor` are injected when the matching feature flag is on
//! and no bridge was supplied.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/library-index.db")
//!     .http_client(Arc::new(MyHttpClient))
//!     .enable_remote_resources(true)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{ContentResolver, HttpClient, NetworkMonitor};
use std::path::PathBuf;
use std::sync::Arc;

/// Core configuration for the indexing engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite index database
    pub database_path: PathBuf,

    /// HTTP client for remote resources
    pub http_client: Option<Arc<dyn HttpClient>>,

    /// Resolver for host content handles
    pub content_resolver: Option<Arc<dyn ContentResolver>>,

    /// Network connectivity monitor
    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,

    /// Capacity of the event bus channel
    pub event_buffer_size: usize,

    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field(
                "content_resolver",
                &self
                    .content_resolver
                    .as_ref()
                    .map(|_| "ContentResolver { ... }"),
            )
            .field(
                "network_monitor",
                &self
                    .network_monitor
                    .as_ref()
                    .map(|_| "NetworkMonitor { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags {
    /// Check connectivity before scanning network-backed sources (requires NetworkMonitor)
    pub enable_network_awareness: bool,

    /// Extract tags from `http(s)://` resources (requires HttpClient)
    pub enable_remote_resources: bool,

    /// Extract tags from `content://` handles (requires ContentResolver)
    pub enable_content_handles: bool,
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// Checks the database path, the event buffer size and that every enabled
    /// feature has the bridge it needs.
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.features.enable_network_awareness && self.network_monitor.is_none() {
            return Err(capability_missing(
                "NetworkMonitor",
                "Network awareness enabled but no NetworkMonitor provided. \
                 Disable the feature or inject a NetworkMonitor implementation.",
            ));
        }

        if self.features.enable_remote_resources && self.http_client.is_none() {
            return Err(capability_missing(
                "HttpClient",
                "Remote resources enabled but no HttpClient provided. \
                 Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient.",
            ));
        }

        if self.features.enable_content_handles && self.content_resolver.is_none() {
            return Err(capability_missing(
                "ContentResolver",
                "Content handles enabled but no ContentResolver provided. \
                 Inject the host's content resolver.",
            ));
        }

        Ok(())
    }
}

fn capability_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn default_http_client() -> Option<Arc<dyn HttpClient>> {
    let client = bridge_desktop::ReqwestHttpClient::try_new().ok()?;
    Some(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn default_http_client() -> Option<Arc<dyn HttpClient>> {
    None
}

#[cfg(feature = "desktop-shims")]
fn default_network_monitor() -> Option<Arc<dyn NetworkMonitor>> {
    Some(Arc::new(bridge_desktop::DesktopNetworkMonitor::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn default_network_monitor() -> Option<Arc<dyn NetworkMonitor>> {
    None
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    content_resolver: Option<Arc<dyn ContentResolver>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    event_buffer_size: Option<usize>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Sets the index database path (required).
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn content_resolver(mut self, resolver: Arc<dyn ContentResolver>) -> Self {
        self.content_resolver = Some(resolver);
        self
    }

    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn enable_network_awareness(mut self, enabled: bool) -> Self {
        self.features.enable_network_awareness = enabled;
        self
    }

    pub fn enable_remote_resources(mut self, enabled: bool) -> Self {
        self.features.enable_remote_resources = enabled;
        self
    }

    pub fn enable_content_handles(mut self, enabled: bool) -> Self {
        self.features.enable_content_handles = enabled;
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds and validates the final `CoreConfig`.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when the database path is missing or a value is invalid
    /// - [`Error::CapabilityMissing`] when an enabled feature has no bridge
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let http_client = match self.http_client {
            Some(client) => Some(client),
            None if self.features.enable_remote_resources => default_http_client(),
            None => None,
        };

        let network_monitor = match self.network_monitor {
            Some(monitor) => Some(monitor),
            None if self.features.enable_network_awareness => default_network_monitor(),
            None => None,
        };

        let config = CoreConfig {
            database_path,
            http_client,
            content_resolver: self.content_resolver,
            network_monitor,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}
