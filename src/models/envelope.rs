//! Wire envelopes exchanged between hub and nodes
//!
//! Every frame on a node connection is one JSON-encoded envelope. The type
//! tag disambiguates; `request`/`response`/`error` carry the correlation id
//! that ties a dispatched request to its eventual reply.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{HubError, HubResult, NodeMetadata};

/// A typed unit of wire communication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// Periodic node liveness report
    Heartbeat { data: NodeMetadata },
    /// Work dispatched from hub to node
    Request { id: Uuid, data: Value },
    /// Result of a dispatched request, matched by correlation id
    Response { id: Uuid, data: Value },
    /// Optional hub reply to a heartbeat
    HeartbeatAck,
    /// Protocol-level rejection; `id` points at the refused request if any
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<Uuid>,
        message: String,
    },
}

impl Envelope {
    /// Serialize for the wire
    pub fn to_json(&self) -> HubResult<String> {
        serde_json::to_string(self).map_err(|e| HubError::SerializationError(e.to_string()))
    }

    /// Parse a frame received from the wire
    pub fn parse(text: &str) -> HubResult<Self> {
        serde_json::from_str(text).map_err(|e| HubError::MalformedEnvelope(e.to_string()))
    }

    /// Short tag for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Heartbeat { .. } => "heartbeat",
            Envelope::Request { .. } => "request",
            Envelope::Response { .. } => "response",
            Envelope::HeartbeatAck => "heartbeat_ack",
            Envelope::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_round_trip() {
        let id = Uuid::new_v4();
        let envelope = Envelope::Request {
            id,
            data: json!({"url": "http://example.com"}),
        };

        let text = envelope.to_json().unwrap();
        assert!(text.contains("\"type\":\"request\""));

        let parsed = Envelope::parse(&text).unwrap();
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn test_tag_names_match_wire_protocol() {
        let ack = Envelope::HeartbeatAck.to_json().unwrap();
        assert_eq!(ack, "{\"type\":\"heartbeat_ack\"}");

        let response = Envelope::Response {
            id: Uuid::nil(),
            data: json!({}),
        };
        assert!(response.to_json().unwrap().contains("\"type\":\"response\""));
    }

    #[test]
    fn test_error_without_id_omits_field() {
        let envelope = Envelope::Error {
            id: None,
            message: "bad".to_string(),
        };
        let text = envelope.to_json().unwrap();
        assert!(!text.contains("\"id\""));
    }

    #[test]
    fn test_unknown_type_is_malformed() {
        let result = Envelope::parse("{\"type\":\"gossip\",\"data\":{}}");
        assert!(matches!(result, Err(HubError::MalformedEnvelope(_))));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            Envelope::parse("not json at all"),
            Err(HubError::MalformedEnvelope(_))
        ));
    }
}
