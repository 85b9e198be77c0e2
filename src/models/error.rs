//! Error types for the Scrape Hub

use thiserror::Error;

/// Hub errors
#[derive(Debug, Error)]
pub enum HubError {
    #[error("No scraper nodes connected")]
    NoNodesAvailable,

    #[error("Node {node_id} disconnected with request in flight")]
    NodeLost { node_id: String },

    #[error("No response within {deadline_secs}s")]
    DispatchTimeout { deadline_secs: u64 },

    #[error("Node rejected request: {0}")]
    NodeRejected(String),

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Invalid broadcast record: {0}")]
    InvalidBroadcastRecord(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HubError {
    pub fn node_lost(node_id: impl Into<String>) -> Self {
        HubError::NodeLost {
            node_id: node_id.into(),
        }
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        HubError::ConnectionError(msg.into())
    }
}

// Convert from standard library errors
impl From<std::io::Error> for HubError {
    fn from(err: std::io::Error) -> Self {
        HubError::ConnectionError(err.to_string())
    }
}

impl From<serde_json::Error> for HubError {
    fn from(err: serde_json::Error) -> Self {
        HubError::SerializationError(err.to_string())
    }
}

impl From<config::ConfigError> for HubError {
    fn from(err: config::ConfigError) -> Self {
        HubError::ConfigError(err.to_string())
    }
}

/// Result type for hub operations
pub type HubResult<T> = Result<T, HubError>;
