//! Scrape hub configuration settings

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main configuration, shared by the hub and node binaries
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub hub: HubSettings,
    #[serde(default)]
    pub dispatch: DispatchSettings,
    #[serde(default)]
    pub discovery: DiscoverySettings,
    #[serde(default)]
    pub node: NodeSettings,
    #[serde(default)]
    pub metrics: MetricsSettings,
}

/// Hub server settings
#[derive(Debug, Clone, Deserialize)]
pub struct HubSettings {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,
    /// Port of the external REST API
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Port of the node WebSocket endpoint
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,
    /// Address advertised in discovery broadcasts; detected when unset.
    /// Multi-interface hosts should set this explicitly.
    pub advertise_host: Option<String>,
    /// Number of HTTP worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Answer heartbeats with a heartbeat_ack envelope
    #[serde(default = "default_true")]
    pub heartbeat_ack: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8000
}

fn default_ws_port() -> u16 {
    8001
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_true() -> bool {
    true
}

/// Request dispatch settings
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchSettings {
    /// Deadline from dispatch to resolution, in seconds
    #[serde(default = "default_dispatch_timeout")]
    pub timeout_secs: u64,
}

fn default_dispatch_timeout() -> u64 {
    120
}

/// Discovery broadcast settings
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverySettings {
    /// Enable the broadcaster on the hub side
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Well-known UDP broadcast port
    #[serde(default = "default_broadcast_port")]
    pub broadcast_port: u16,
    /// Seconds between broadcasts
    #[serde(default = "default_broadcast_interval")]
    pub interval_secs: u64,
}

fn default_broadcast_port() -> u16 {
    37020
}

fn default_broadcast_interval() -> u64 {
    5
}

/// Node agent settings
#[derive(Debug, Clone, Deserialize)]
pub struct NodeSettings {
    /// Unique node identifier; a fresh UUID when unset
    #[serde(default = "default_node_id")]
    pub node_id: String,
    /// Hub address as host:port; skips broadcast discovery when set
    pub hub_address: Option<String>,
    /// Seconds between heartbeats
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    /// Backoff after a failed heartbeat send, in seconds
    #[serde(default = "default_heartbeat_retry")]
    pub heartbeat_retry_secs: u64,
    /// Bound of the work queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Capability descriptors reported in heartbeats
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<String>,
    /// Discard queued-but-unstarted work on disconnect instead of keeping it
    #[serde(default)]
    pub drain_on_disconnect: bool,
    /// Pause before re-entering discovery after a disconnect, in seconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

fn default_node_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_heartbeat_interval() -> u64 {
    3
}

fn default_heartbeat_retry() -> u64 {
    5
}

fn default_queue_capacity() -> usize {
    32
}

fn default_capabilities() -> Vec<String> {
    vec!["chromium".to_string()]
}

fn default_reconnect_delay() -> u64 {
    2
}

/// Metrics settings
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Metrics endpoint path
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for HubSettings {
    fn default() -> Self {
        HubSettings {
            host: default_host(),
            http_port: default_http_port(),
            ws_port: default_ws_port(),
            advertise_host: None,
            workers: default_workers(),
            heartbeat_ack: true,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        DispatchSettings {
            timeout_secs: default_dispatch_timeout(),
        }
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        DiscoverySettings {
            enabled: true,
            broadcast_port: default_broadcast_port(),
            interval_secs: default_broadcast_interval(),
        }
    }
}

impl Default for NodeSettings {
    fn default() -> Self {
        NodeSettings {
            node_id: default_node_id(),
            hub_address: None,
            heartbeat_interval_secs: default_heartbeat_interval(),
            heartbeat_retry_secs: default_heartbeat_retry(),
            queue_capacity: default_queue_capacity(),
            capabilities: default_capabilities(),
            drain_on_disconnect: false,
            reconnect_delay_secs: default_reconnect_delay(),
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        MetricsSettings {
            enabled: true,
            path: default_metrics_path(),
        }
    }
}

impl Settings {
    /// Load settings from file and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load settings from a specific config file path (without extension)
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref();

        let builder = Config::builder()
            // Add config file if it exists
            .add_source(File::with_name(config_path.to_str().unwrap_or("config")).required(false))
            // Add environment variables with prefix SCRAPE_HUB_
            .add_source(Environment::with_prefix("SCRAPE_HUB").separator("__"));

        builder.build()?.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            hub: HubSettings::default(),
            dispatch: DispatchSettings::default(),
            discovery: DiscoverySettings::default(),
            node: NodeSettings::default(),
            metrics: MetricsSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.hub.http_port, 8000);
        assert_eq!(settings.hub.ws_port, 8001);
        assert_eq!(settings.discovery.broadcast_port, 37020);
        assert_eq!(settings.discovery.interval_secs, 5);
        assert_eq!(settings.dispatch.timeout_secs, 120);
        assert!(!settings.node.drain_on_disconnect);
    }

    #[test]
    fn test_node_id_defaults_to_fresh_uuid() {
        let a = NodeSettings::default();
        let b = NodeSettings::default();
        assert_ne!(a.node_id, b.node_id);
        assert!(uuid::Uuid::parse_str(&a.node_id).is_ok());
    }
}
