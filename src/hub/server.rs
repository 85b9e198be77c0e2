//! WebSocket server for node connections
//!
//! Accepts one persistent connection per node at `/ws/{node_id}` and runs a
//! receive loop per connection, feeding heartbeats and responses into the
//! dispatcher. Outbound traffic is serialized by a per-connection writer
//! task draining the handle stored in the registry.

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::models::{Envelope, HubError, HubResult};

use super::dispatcher::RequestDispatcher;

/// WebSocket endpoint accepting node connections
pub struct NodeServer {
    dispatcher: RequestDispatcher,
    bind_addr: String,
}

impl NodeServer {
    pub fn new(dispatcher: RequestDispatcher, host: &str, port: u16) -> Self {
        Self {
            dispatcher,
            bind_addr: format!("{}:{}", host, port),
        }
    }

    /// Accept node connections until the process shuts down
    pub async fn run(self) -> HubResult<()> {
        let listener = TcpListener::bind(&self.bind_addr).await?;
        info!("Node connection endpoint listening on {}", self.bind_addr);

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let dispatcher = self.dispatcher.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, dispatcher).await {
                            debug!("Connection from {} ended with error: {}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept node connection: {}", e);
                }
            }
        }
    }
}

/// Extract the node identifier from the upgrade path `/ws/{node_id}`
fn parse_node_id(path: &str) -> Option<String> {
    let id = path.strip_prefix("/ws/")?;
    if id.is_empty() || id.contains('/') {
        return None;
    }
    Some(id.to_string())
}

/// Handshake, register, then run the receive loop until the socket closes
async fn handle_connection(stream: TcpStream, dispatcher: RequestDispatcher) -> HubResult<()> {
    let mut node_id = None;
    let ws = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, response: Response| {
        match parse_node_id(req.uri().path()) {
            Some(id) => {
                node_id = Some(id);
                Ok(response)
            }
            None => Err(ErrorResponse::new(Some(
                "expected path /ws/{node_id}".to_string(),
            ))),
        }
    })
    .await
    .map_err(|e| HubError::connection(e.to_string()))?;

    // the handshake callback ran successfully, so the id is present
    let node_id = node_id.ok_or_else(|| HubError::Internal("handshake lost node id".into()))?;

    let (mut sink, mut stream) = ws.split();
    let (handle, mut outbound) = mpsc::unbounded_channel::<Envelope>();

    // writer task: the only place this connection is written to
    let writer_id = node_id.clone();
    let writer = tokio::spawn(async move {
        while let Some(envelope) = outbound.recv().await {
            let text = match envelope.to_json() {
                Ok(text) => text,
                Err(e) => {
                    warn!("Dropping unserializable envelope for {}: {}", writer_id, e);
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    dispatcher.node_connected(&node_id, handle.clone());

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match Envelope::parse(&text) {
                Ok(Envelope::Heartbeat { data }) => {
                    debug!("Heartbeat from node {}: state {}", node_id, data.state);
                    dispatcher.handle_heartbeat(&node_id, &data);
                }
                Ok(Envelope::Response { id, data }) => {
                    dispatcher.handle_response(id, data);
                }
                Ok(Envelope::Error { id, message }) => {
                    dispatcher.handle_node_error(id, message);
                }
                Ok(other) => {
                    debug!(
                        "Discarding unexpected {} envelope from node {}",
                        other.kind(),
                        node_id
                    );
                }
                Err(e) => {
                    warn!("Malformed envelope from node {}: {}", node_id, e);
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // binary/ping/pong frames carry no protocol meaning
            Err(e) => {
                debug!("Read error on connection of node {}: {}", node_id, e);
                break;
            }
        }
    }

    dispatcher.connection_closed(&node_id, &handle);
    writer.abort();
    Ok(())
}
