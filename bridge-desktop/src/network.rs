//! Network Monitoring Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType},
};
use std::time::Duration;
use tracing::debug;

const DEFAULT_PROBE_ADDR: &str = "8.8.8.8:53";

/// Desktop network monitor implementation
///
/// Reports connectivity by opening a TCP connection to a well-known address.
/// Network type and metering are not detected; desktop links are reported as
/// unmetered.
pub struct DesktopNetworkMonitor {
    probe_addr: String,
    probe_timeout: Duration,
}

impl DesktopNetworkMonitor {
    pub fn new() -> Self {
        Self::with_probe(DEFAULT_PROBE_ADDR, Duration::from_secs(5))
    }

    /// Probe a custom `host:port` instead of the public resolver
    pub fn with_probe(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            probe_addr: addr.into(),
            probe_timeout: timeout,
        }
    }

    async fn check_connectivity(&self) -> NetworkStatus {
        match tokio::time::timeout(
            self.probe_timeout,
            tokio::net::TcpStream::connect(&self.probe_addr),
        )
        .await
        {
            Ok(Ok(_)) => NetworkStatus::Connected,
            Ok(Err(_)) | Err(_) => NetworkStatus::Disconnected,
        }
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let status = self.check_connectivity().await;
        debug!(status = ?status, probe = %self.probe_addr, "Network info updated");

        Ok(NetworkInfo {
            status,
            network_type: (status == NetworkStatus::Connected).then_some(NetworkType::Other),
            is_metered: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_reachable_probe_is_connected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let monitor = DesktopNetworkMonitor::with_probe(addr.to_string(), Duration::from_secs(1));

        let info = monitor.get_network_info().await.unwrap();
        assert_eq!(info.status, NetworkStatus::Connected);
        assert_eq!(info.network_type, Some(NetworkType::Other));
        assert!(monitor.is_connected().await);
    }

    #[tokio::test]
    async fn test_unreachable_probe_is_disconnected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let monitor = DesktopNetworkMonitor::with_probe(addr.to_string(), Duration::from_secs(1));

        let info = monitor.get_network_info().await.unwrap();
        assert_eq!(info.status, NetworkStatus::Disconnected);
        assert!(info.network_type.is_none());
        assert!(!info.is_metered);
    }
}
