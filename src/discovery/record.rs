//! The broadcast record advertising the hub's node endpoint

use std::fmt;
use std::str::FromStr;

use crate::models::HubError;

/// Marker prefixing every broadcast record
pub const BROADCAST_MARKER: &str = "hub";

/// Address a node should open its persistent connection to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubAddress {
    pub host: String,
    pub port: u16,
}

impl HubAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse a `host:port` pair, as given on a node's command line
    pub fn from_host_port(s: &str) -> Result<Self, HubError> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| HubError::ConfigError(format!("expected host:port, got {:?}", s)))?;
        let port = port
            .parse()
            .map_err(|_| HubError::ConfigError(format!("invalid port in {:?}", s)))?;
        if host.is_empty() {
            return Err(HubError::ConfigError(format!("empty host in {:?}", s)));
        }
        Ok(Self::new(host, port))
    }

    /// URL of the hub's WebSocket endpoint for the given node
    pub fn ws_url(&self, node_id: &str) -> String {
        format!("ws://{}:{}/ws/{}", self.host, self.port, node_id)
    }
}

impl fmt::Display for HubAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", BROADCAST_MARKER, self.host, self.port)
    }
}

impl FromStr for HubAddress {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let marker = parts.next().unwrap_or_default();
        if marker != BROADCAST_MARKER {
            return Err(HubError::InvalidBroadcastRecord(format!(
                "unknown marker {:?}",
                marker
            )));
        }

        let host = parts
            .next()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| HubError::InvalidBroadcastRecord("missing host".to_string()))?;
        let port = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| HubError::InvalidBroadcastRecord("missing or invalid port".to_string()))?;

        Ok(HubAddress::new(host, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_format_round_trip() {
        let address = HubAddress::new("10.0.0.5", 8000);
        let record = address.to_string();
        assert_eq!(record, "hub:10.0.0.5:8000");

        let parsed: HubAddress = record.parse().unwrap();
        assert_eq!(parsed, address);
    }

    #[test]
    fn test_rejects_wrong_marker() {
        let result: Result<HubAddress, _> = "node:10.0.0.5:8000".parse();
        assert!(matches!(result, Err(HubError::InvalidBroadcastRecord(_))));
    }

    #[test]
    fn test_rejects_incomplete_records() {
        assert!("hub".parse::<HubAddress>().is_err());
        assert!("hub:".parse::<HubAddress>().is_err());
        assert!("hub:10.0.0.5".parse::<HubAddress>().is_err());
        assert!("hub:10.0.0.5:notaport".parse::<HubAddress>().is_err());
    }

    #[test]
    fn test_ws_url() {
        let address = HubAddress::new("192.168.1.10", 8001);
        assert_eq!(
            address.ws_url("node-1"),
            "ws://192.168.1.10:8001/ws/node-1"
        );
    }

    #[test]
    fn test_from_host_port() {
        let address = HubAddress::from_host_port("192.168.1.10:8001").unwrap();
        assert_eq!(address, HubAddress::new("192.168.1.10", 8001));
        assert!(HubAddress::from_host_port("no-port").is_err());
        assert!(HubAddress::from_host_port(":8001").is_err());
    }
}
