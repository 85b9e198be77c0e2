//! Connection registry: which nodes currently hold a live connection
//!
//! The registry is the sole owner of connection handles. Receive loops
//! register on handshake and unregister on disconnect; the dispatcher only
//! ever sees node identifiers and goes through [`ConnectionRegistry::send`].

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::models::{Envelope, HubError, HubResult, NodeMetadata, NodeState};

/// Handle for pushing envelopes to a node's per-connection writer task
pub type ConnectionHandle = mpsc::UnboundedSender<Envelope>;

/// A node's live connection as tracked by the registry
#[derive(Debug)]
pub struct NodeConnection {
    pub node_id: String,
    pub handle: ConnectionHandle,
    pub last_heartbeat: DateTime<Utc>,
    pub state: NodeState,
    pub capabilities: Vec<String>,
    pub connected_at: DateTime<Utc>,
}

/// Snapshot of one registered node, for the nodes listing endpoint
#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub node_id: String,
    pub state: NodeState,
    pub capabilities: Vec<String>,
    pub last_heartbeat: DateTime<Utc>,
    pub connected_at: DateTime<Utc>,
}

/// Registry of currently connected nodes
#[derive(Debug)]
pub struct ConnectionRegistry {
    nodes: Arc<RwLock<HashMap<String, NodeConnection>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a node connection
    ///
    /// Replaces any prior entry for the same identifier; the prior handle is
    /// dropped, which closes its writer. Returns true if an entry was
    /// replaced, in which case the caller must fail requests still in flight
    /// to the old connection.
    pub fn register(&self, node_id: impl Into<String>, handle: ConnectionHandle) -> bool {
        let node_id = node_id.into();
        let now = Utc::now();
        let connection = NodeConnection {
            node_id: node_id.clone(),
            handle,
            last_heartbeat: now,
            state: NodeState::Idle,
            capabilities: Vec::new(),
            connected_at: now,
        };

        let replaced = self.nodes.write().insert(node_id.clone(), connection);
        if replaced.is_some() {
            info!("Node {} re-registered, replacing prior connection", node_id);
        } else {
            info!("Node {} connected", node_id);
        }
        replaced.is_some()
    }

    /// Remove a node's entry. Returns true if it was present.
    pub fn unregister(&self, node_id: &str) -> bool {
        let removed = self.nodes.write().remove(node_id).is_some();
        if removed {
            info!("Node {} disconnected", node_id);
        }
        removed
    }

    /// Remove a node's entry only if it still belongs to `handle`
    ///
    /// A receive loop that outlived a re-registration must not tear down the
    /// replacement connection when its own stale socket finally closes.
    pub fn unregister_if_current(&self, node_id: &str, handle: &ConnectionHandle) -> bool {
        let mut nodes = self.nodes.write();
        match nodes.get(node_id) {
            Some(connection) if connection.handle.same_channel(handle) => {
                nodes.remove(node_id);
                info!("Node {} disconnected", node_id);
                true
            }
            Some(_) => {
                debug!(
                    "Stale connection of node {} closed after replacement",
                    node_id
                );
                false
            }
            None => false,
        }
    }

    /// Refresh a node's heartbeat timestamp and observed state
    pub fn heartbeat(&self, node_id: &str, metadata: &NodeMetadata) -> bool {
        let mut nodes = self.nodes.write();
        if let Some(connection) = nodes.get_mut(node_id) {
            connection.last_heartbeat = Utc::now();
            connection.state = metadata.state;
            connection.capabilities = metadata.capabilities.clone();
            true
        } else {
            debug!("Heartbeat from unregistered node {}", node_id);
            false
        }
    }

    /// Identifiers of all currently registered nodes
    pub fn list_live(&self) -> Vec<String> {
        self.nodes.read().keys().cloned().collect()
    }

    /// Pick one live node uniformly at random
    pub fn pick_random(&self) -> Option<String> {
        let nodes = self.nodes.read();
        let ids: Vec<&String> = nodes.keys().collect();
        ids.choose(&mut rand::thread_rng())
            .map(|id| (*id).clone())
    }

    /// Send an envelope to a registered node
    pub fn send(&self, node_id: &str, envelope: Envelope) -> HubResult<()> {
        let nodes = self.nodes.read();
        let connection = nodes
            .get(node_id)
            .ok_or_else(|| HubError::node_lost(node_id))?;
        connection
            .handle
            .send(envelope)
            .map_err(|_| HubError::node_lost(node_id))
    }

    /// Serializable view of every registered node
    pub fn snapshot(&self) -> Vec<NodeSummary> {
        self.nodes
            .read()
            .values()
            .map(|c| NodeSummary {
                node_id: c.node_id.clone(),
                state: c.state,
                capabilities: c.capabilities.clone(),
                last_heartbeat: c.last_heartbeat,
                connected_at: c.connected_at,
            })
            .collect()
    }

    /// Number of registered nodes
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

impl Clone for ConnectionRegistry {
    fn clone(&self) -> Self {
        Self {
            nodes: Arc::clone(&self.nodes),
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> (ConnectionHandle, mpsc::UnboundedReceiver<Envelope>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn test_register_and_list() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = handle();

        assert!(!registry.register("node-1", tx));
        assert_eq!(registry.list_live(), vec!["node-1".to_string()]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_registration_replaces_exactly_once() {
        let registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = handle();
        let (tx2, _rx2) = handle();

        assert!(!registry.register("node-1", tx1));
        assert!(registry.register("node-1", tx2));
        assert_eq!(registry.len(), 1);

        // old handle is dropped with the replaced entry
        assert!(rx1.try_recv().is_err());
    }

    #[test]
    fn test_unregister_removes_entry() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = handle();

        registry.register("node-1", tx);
        assert!(registry.unregister("node-1"));
        assert!(!registry.unregister("node-1"));
        assert!(registry.list_live().is_empty());
    }

    #[test]
    fn test_stale_handle_cannot_unregister_replacement() {
        let registry = ConnectionRegistry::new();
        let (tx_old, _rx_old) = handle();
        let (tx_new, _rx_new) = handle();

        registry.register("node-1", tx_old.clone());
        registry.register("node-1", tx_new.clone());

        // the old connection's teardown must not remove the new entry
        assert!(!registry.unregister_if_current("node-1", &tx_old));
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister_if_current("node-1", &tx_new));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_pick_random_only_selects_live_nodes() {
        let registry = ConnectionRegistry::new();
        assert!(registry.pick_random().is_none());

        let (tx1, _rx1) = handle();
        let (tx2, _rx2) = handle();
        registry.register("node-1", tx1);
        registry.register("node-2", tx2);
        registry.unregister("node-2");

        for _ in 0..20 {
            assert_eq!(registry.pick_random().as_deref(), Some("node-1"));
        }
    }

    #[test]
    fn test_heartbeat_updates_state() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = handle();
        registry.register("node-1", tx);

        let metadata = NodeMetadata::new("node-1", "10.0.0.7")
            .with_capabilities(vec!["chromium".to_string()])
            .with_state(NodeState::Busy);
        assert!(registry.heartbeat("node-1", &metadata));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].state, NodeState::Busy);
        assert_eq!(snapshot[0].capabilities, vec!["chromium".to_string()]);
    }

    #[test]
    fn test_heartbeat_from_unknown_node_is_ignored() {
        let registry = ConnectionRegistry::new();
        let metadata = NodeMetadata::new("ghost", "10.0.0.9");
        assert!(!registry.heartbeat("ghost", &metadata));
    }

    #[test]
    fn test_send_to_unknown_node_fails_with_node_lost() {
        let registry = ConnectionRegistry::new();
        let result = registry.send("ghost", Envelope::HeartbeatAck);
        assert!(matches!(result, Err(HubError::NodeLost { .. })));
    }
}
