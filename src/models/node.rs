//! Node identity and heartbeat metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Work state a node reports in its heartbeats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    /// Waiting for work
    Idle,
    /// Currently running an extraction
    Busy,
}

impl Default for NodeState {
    fn default() -> Self {
        NodeState::Idle
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeState::Idle => write!(f, "idle"),
            NodeState::Busy => write!(f, "busy"),
        }
    }
}

/// Metadata carried in every heartbeat envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Unique node identifier (UUID by convention)
    pub node_id: String,
    /// Address the node considers itself reachable at
    pub address: String,
    /// Capability descriptors, e.g. browser engines the node can drive
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Current work state
    #[serde(default)]
    pub state: NodeState,
    /// When the heartbeat was produced
    pub timestamp: DateTime<Utc>,
}

impl NodeMetadata {
    pub fn new(node_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            address: address.into(),
            capabilities: Vec::new(),
            state: NodeState::Idle,
            timestamp: Utc::now(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_state(mut self, state: NodeState) -> Self {
        self.state = state;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&NodeState::Idle).unwrap(), "\"idle\"");
        assert_eq!(serde_json::to_string(&NodeState::Busy).unwrap(), "\"busy\"");
    }

    #[test]
    fn test_metadata_defaults() {
        let meta = NodeMetadata::new("node-1", "10.0.0.7");
        assert_eq!(meta.state, NodeState::Idle);
        assert!(meta.capabilities.is_empty());
    }
}
