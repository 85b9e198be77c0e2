//! In-flight request table, keyed by correlation id
//!
//! Keying by correlation id rather than node id is what allows several
//! requests to be outstanding to the same node at once: each dispatch gets
//! its own entry, and a response resolves exactly the entry whose id it
//! carries. Entries also record their target node so node loss fails only
//! the affected requests.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

use crate::models::{HubError, HubResult};

/// What a dispatch caller eventually receives
pub type DispatchOutcome = HubResult<Value>;

struct PendingEntry {
    node_id: String,
    tx: oneshot::Sender<DispatchOutcome>,
}

/// Table of requests awaiting their response envelope
pub struct PendingTable {
    entries: Arc<Mutex<HashMap<uuid::Uuid, PendingEntry>>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record a new in-flight request addressed to `node_id`
    pub fn insert(
        &self,
        correlation_id: uuid::Uuid,
        node_id: impl Into<String>,
        tx: oneshot::Sender<DispatchOutcome>,
    ) {
        self.entries.lock().insert(
            correlation_id,
            PendingEntry {
                node_id: node_id.into(),
                tx,
            },
        );
    }

    /// Resolve the entry matching `correlation_id` with a response payload
    ///
    /// Returns false if no entry matched (already timed out, or unknown id);
    /// the caller logs and discards in that case.
    pub fn complete(&self, correlation_id: uuid::Uuid, data: Value) -> bool {
        match self.entries.lock().remove(&correlation_id) {
            Some(entry) => entry.tx.send(Ok(data)).is_ok(),
            None => false,
        }
    }

    /// Fail the entry matching `correlation_id` with an error
    pub fn fail(&self, correlation_id: uuid::Uuid, error: HubError) -> bool {
        match self.entries.lock().remove(&correlation_id) {
            Some(entry) => entry.tx.send(Err(error)).is_ok(),
            None => false,
        }
    }

    /// Fail every entry addressed to `node_id` with NodeLost
    ///
    /// Called when a node's connection closes or is replaced. Returns how
    /// many requests were failed.
    pub fn fail_node(&self, node_id: &str) -> usize {
        let mut entries = self.entries.lock();
        let affected: Vec<uuid::Uuid> = entries
            .iter()
            .filter(|(_, e)| e.node_id == node_id)
            .map(|(id, _)| *id)
            .collect();

        for id in &affected {
            if let Some(entry) = entries.remove(id) {
                let _ = entry.tx.send(Err(HubError::node_lost(node_id)));
            }
        }

        if !affected.is_empty() {
            debug!(
                "Failed {} in-flight request(s) addressed to node {}",
                affected.len(),
                node_id
            );
        }
        affected.len()
    }

    /// Drop the entry for a request whose caller gave up (timeout purge)
    pub fn remove(&self, correlation_id: uuid::Uuid) -> bool {
        self.entries.lock().remove(&correlation_id).is_some()
    }

    /// Number of in-flight requests
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Clone for PendingTable {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_complete_resolves_exactly_once() {
        let table = PendingTable::new();
        let id = uuid::Uuid::new_v4();
        let (tx, mut rx) = oneshot::channel();

        table.insert(id, "node-1", tx);
        assert!(table.complete(id, json!({"ok": true})));
        // entry is gone, a second response is a no-op
        assert!(!table.complete(id, json!({"ok": false})));

        let outcome = rx.try_recv().unwrap().unwrap();
        assert_eq!(outcome, json!({"ok": true}));
    }

    #[test]
    fn test_unknown_correlation_id_is_reported() {
        let table = PendingTable::new();
        assert!(!table.complete(uuid::Uuid::new_v4(), json!(null)));
    }

    #[test]
    fn test_fail_node_only_affects_matching_entries() {
        let table = PendingTable::new();
        let id_a = uuid::Uuid::new_v4();
        let id_b = uuid::Uuid::new_v4();
        let (tx_a, mut rx_a) = oneshot::channel();
        let (tx_b, mut rx_b) = oneshot::channel();

        table.insert(id_a, "node-a", tx_a);
        table.insert(id_b, "node-b", tx_b);

        assert_eq!(table.fail_node("node-a"), 1);
        assert_eq!(table.len(), 1);

        assert!(matches!(
            rx_a.try_recv().unwrap(),
            Err(HubError::NodeLost { .. })
        ));
        assert!(rx_b.try_recv().is_err()); // still pending

        // node-b entry still resolvable
        assert!(table.complete(id_b, json!(1)));
        assert!(rx_b.try_recv().unwrap().is_ok());
    }

    #[test]
    fn test_remove_purges_entry_so_late_response_is_discarded() {
        let table = PendingTable::new();
        let id = uuid::Uuid::new_v4();
        let (tx, _rx) = oneshot::channel();

        table.insert(id, "node-1", tx);
        assert!(table.remove(id));
        assert!(table.is_empty());
        assert!(!table.complete(id, json!(null)));
    }
}
