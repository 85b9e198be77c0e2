//! Request dispatcher: routes a submitted request to one live node and
//! correlates the eventual reply back to the caller
//!
//! Selection is uniform random over the live set, with no load awareness and
//! no retry. Concurrent requests may land on the same node; the correlation
//! id, not the node id, ties a response to its caller, and the node's own
//! queue decides how they interleave.

use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::metrics;
use crate::models::{Envelope, HubError, HubResult, NodeMetadata};

use super::pending::PendingTable;
use super::registry::{ConnectionHandle, ConnectionRegistry};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Deadline from dispatch to resolution
    pub timeout: Duration,
    /// Whether heartbeats are answered with a heartbeat_ack
    pub heartbeat_ack: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            heartbeat_ack: true,
        }
    }
}

/// Routes external requests to nodes and resolves their responses
pub struct RequestDispatcher {
    registry: ConnectionRegistry,
    pending: PendingTable,
    config: DispatcherConfig,
}

impl RequestDispatcher {
    pub fn new(registry: ConnectionRegistry, config: DispatcherConfig) -> Self {
        Self {
            registry,
            pending: PendingTable::new(),
            config,
        }
    }

    /// The registry this dispatcher routes over
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Dispatch a request payload to one live node and await its response
    ///
    /// Fails fast with NoNodesAvailable when the live set is empty, with
    /// NodeLost when the chosen node disconnects before responding, and with
    /// DispatchTimeout when the configured deadline elapses first (the stale
    /// entry is purged so a late response is discarded, not leaked).
    pub async fn dispatch(&self, payload: Value) -> HubResult<Value> {
        let node_id = self
            .registry
            .pick_random()
            .ok_or(HubError::NoNodesAvailable)?;

        let correlation_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(correlation_id, &node_id, tx);

        let envelope = Envelope::Request {
            id: correlation_id,
            data: payload,
        };

        if let Err(e) = self.registry.send(&node_id, envelope) {
            self.pending.remove(correlation_id);
            metrics::record_dispatch_failure();
            return Err(e);
        }

        debug!("Dispatched request {} to node {}", correlation_id, node_id);
        metrics::record_dispatch();
        let started = Instant::now();

        let outcome = match tokio::time::timeout(self.config.timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            // the pending entry was dropped without resolution; treat as node loss
            Ok(Err(_)) => Err(HubError::node_lost(&node_id)),
            Err(_) => {
                self.pending.remove(correlation_id);
                warn!(
                    "Request {} to node {} timed out after {:?}",
                    correlation_id, node_id, self.config.timeout
                );
                Err(HubError::DispatchTimeout {
                    deadline_secs: self.config.timeout.as_secs(),
                })
            }
        };

        metrics::record_dispatch_duration(started.elapsed().as_secs_f64());
        if outcome.is_err() {
            metrics::record_dispatch_failure();
        }
        outcome
    }

    // ========================================================================
    // Receive-loop entry points
    // ========================================================================

    /// A node completed its handshake
    ///
    /// Registering an identifier that already has a live connection replaces
    /// the old entry; requests still in flight to the replaced handle are
    /// failed here rather than left dangling.
    pub fn node_connected(&self, node_id: &str, handle: ConnectionHandle) {
        let replaced = self.registry.register(node_id, handle);
        if replaced {
            self.pending.fail_node(node_id);
        }
        metrics::set_connected_nodes(self.registry.len() as i64);
    }

    /// A node's connection closed or errored
    pub fn node_disconnected(&self, node_id: &str) {
        self.registry.unregister(node_id);
        self.pending.fail_node(node_id);
        metrics::set_connected_nodes(self.registry.len() as i64);
    }

    /// A specific connection of a node closed
    ///
    /// Only tears the node down if that connection is still the registered
    /// one; a stale socket closing after a re-registration must not fail
    /// requests in flight to the replacement.
    pub fn connection_closed(&self, node_id: &str, handle: &ConnectionHandle) {
        if self.registry.unregister_if_current(node_id, handle) {
            self.pending.fail_node(node_id);
        }
        metrics::set_connected_nodes(self.registry.len() as i64);
    }

    /// A heartbeat envelope arrived from `node_id`
    pub fn handle_heartbeat(&self, node_id: &str, metadata: &NodeMetadata) {
        self.registry.heartbeat(node_id, metadata);
        metrics::record_heartbeat();
        if self.config.heartbeat_ack {
            // best effort; a failed ack means the connection is going away
            let _ = self.registry.send(node_id, Envelope::HeartbeatAck);
        }
    }

    /// A response envelope arrived; resolve its pending entry
    pub fn handle_response(&self, correlation_id: Uuid, data: Value) {
        if !self.pending.complete(correlation_id, data) {
            debug!(
                "Discarding response with no pending entry (correlation {})",
                correlation_id
            );
            metrics::record_response_discarded();
        }
    }

    /// An error envelope arrived (e.g. the node's queue was full)
    pub fn handle_node_error(&self, correlation_id: Option<Uuid>, message: String) {
        match correlation_id {
            Some(id) => {
                if !self.pending.fail(id, HubError::NodeRejected(message)) {
                    debug!("Discarding error with no pending entry (correlation {})", id);
                }
            }
            None => warn!("Node reported error without correlation id: {}", message),
        }
    }

    /// Number of requests currently in flight
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}

impl Clone for RequestDispatcher {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            pending: self.pending.clone(),
            config: self.config.clone(),
        }
    }
}
