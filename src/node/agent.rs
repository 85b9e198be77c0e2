//! Node agent: discovery, heartbeat, and work-queue state machine
//!
//! The agent cycles Discovering → Connecting → Connected → Disconnected and
//! back. While Connected, three tasks share one bounded work queue: a
//! heartbeat task, a receive task feeding the queue, and a processing task
//! draining it through the extraction collaborator. The queue and the
//! processing task outlive individual connections, so queued work survives a
//! reconnect unless the drain policy says otherwise.

use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{DiscoverySettings, NodeSettings};
use crate::discovery::{self, HubAddress};
use crate::models::{Envelope, HubError, HubResult, NodeMetadata, NodeState, ScrapeRequest};

use super::extractor::PageExtractor;

/// Lifecycle phase of the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPhase {
    /// Waiting for a hub announcement (skipped with a configured address)
    Discovering,
    /// Opening the persistent connection
    Connecting,
    /// Connection live; heartbeat/receive/processing tasks running
    Connected,
    /// Connection lost; about to re-enter Discovering
    Disconnected,
}

/// One dispatched request queued for processing
#[derive(Debug)]
struct WorkItem {
    correlation_id: Uuid,
    payload: Value,
    generation: u64,
}

/// Worker node agent
pub struct NodeAgent {
    settings: NodeSettings,
    discovery: DiscoverySettings,
    extractor: Arc<dyn PageExtractor>,
    /// Address reported in heartbeats
    address: String,
    state: RwLock<NodeState>,
    phase: RwLock<AgentPhase>,
    /// Writer handle of the current connection, None while disconnected
    outbound: RwLock<Option<mpsc::UnboundedSender<Envelope>>>,
    /// Last hub we connected to, for mid-task response delivery
    last_hub: RwLock<Option<HubAddress>>,
    /// Bumped on every disconnect; stale queued work is detected by this
    generation: AtomicU64,
}

impl NodeAgent {
    pub fn new(
        settings: NodeSettings,
        discovery: DiscoverySettings,
        extractor: Arc<dyn PageExtractor>,
    ) -> Arc<Self> {
        let address = discovery::detect_local_addr()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "127.0.0.1".to_string());

        Arc::new(Self {
            settings,
            discovery,
            extractor,
            address,
            state: RwLock::new(NodeState::Idle),
            phase: RwLock::new(AgentPhase::Discovering),
            outbound: RwLock::new(None),
            last_hub: RwLock::new(None),
            generation: AtomicU64::new(0),
        })
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> AgentPhase {
        *self.phase.read()
    }

    /// Metadata carried in heartbeats
    pub fn metadata(&self) -> NodeMetadata {
        NodeMetadata::new(&self.settings.node_id, &self.address)
            .with_capabilities(self.settings.capabilities.clone())
            .with_state(*self.state.read())
    }

    /// Run the agent until a fatal configuration error
    ///
    /// Connection failures are not fatal: the agent re-enters Discovering
    /// after each attempt.
    pub async fn run(self: Arc<Self>) -> HubResult<()> {
        // configured address is validated once, up front
        let configured = match &self.settings.hub_address {
            Some(addr) => Some(HubAddress::from_host_port(addr)?),
            None => None,
        };

        let (work_tx, work_rx) = mpsc::channel(self.settings.queue_capacity);
        let processor = tokio::spawn(Arc::clone(&self).process_loop(work_rx));

        let result = Arc::clone(&self).connection_loop(configured, work_tx).await;
        processor.abort();
        result
    }

    async fn connection_loop(
        self: Arc<Self>,
        configured: Option<HubAddress>,
        work_tx: mpsc::Sender<WorkItem>,
    ) -> HubResult<()> {
        let reconnect_delay = Duration::from_secs(self.settings.reconnect_delay_secs);

        loop {
            *self.phase.write() = AgentPhase::Discovering;
            let hub = match &configured {
                Some(address) => {
                    debug!("Using configured hub address {}:{}", address.host, address.port);
                    address.clone()
                }
                None => {
                    discovery::await_hub_announcement(self.discovery.broadcast_port).await?
                }
            };
            *self.last_hub.write() = Some(hub.clone());

            *self.phase.write() = AgentPhase::Connecting;
            match Arc::clone(&self).serve_connection(&hub, &work_tx).await {
                Ok(()) => info!("Connection to hub closed"),
                Err(e) => warn!("Connection to hub failed: {}", e),
            }

            *self.phase.write() = AgentPhase::Disconnected;
            self.generation.fetch_add(1, Ordering::SeqCst);
            time::sleep(reconnect_delay).await;
        }
    }

    /// One Connected phase: runs until the connection drops
    async fn serve_connection(
        self: Arc<Self>,
        hub: &HubAddress,
        work_tx: &mpsc::Sender<WorkItem>,
    ) -> HubResult<()> {
        let url = hub.ws_url(&self.settings.node_id);
        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| HubError::connection(e.to_string()))?;
        info!("Connected to hub at {}:{}", hub.host, hub.port);
        *self.phase.write() = AgentPhase::Connected;

        let (mut sink, mut stream) = ws.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Envelope>();
        *self.outbound.write() = Some(outbound_tx.clone());

        // writer task: sole writer of this connection
        let writer = tokio::spawn(async move {
            while let Some(envelope) = outbound_rx.recv().await {
                let text = match envelope.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Dropping unserializable envelope: {}", e);
                        continue;
                    }
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        });

        let heartbeat = tokio::spawn(Arc::clone(&self).heartbeat_loop(outbound_tx.clone()));

        // receive task runs inline; ending it ends the Connected phase
        let result = self.receive_loop(&mut stream, work_tx, &outbound_tx).await;

        heartbeat.abort();
        *self.outbound.write() = None;
        writer.abort();
        result
    }

    /// Periodic heartbeats; a failed send is retried after a backoff
    async fn heartbeat_loop(self: Arc<Self>, outbound: mpsc::UnboundedSender<Envelope>) {
        let interval = Duration::from_secs(self.settings.heartbeat_interval_secs);
        let backoff = Duration::from_secs(self.settings.heartbeat_retry_secs);

        loop {
            let envelope = Envelope::Heartbeat {
                data: self.metadata(),
            };
            if outbound.send(envelope).is_err() {
                warn!("Heartbeat send failed, retrying in {:?}", backoff);
                time::sleep(backoff).await;
                continue;
            }
            time::sleep(interval).await;
        }
    }

    /// Read envelopes until the connection closes or errors
    async fn receive_loop(
        &self,
        stream: &mut (impl futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
              + Unpin),
        work_tx: &mpsc::Sender<WorkItem>,
        outbound: &mpsc::UnboundedSender<Envelope>,
    ) -> HubResult<()> {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => match Envelope::parse(&text) {
                    Ok(Envelope::Request { id, data }) => {
                        let item = WorkItem {
                            correlation_id: id,
                            payload: data,
                            generation: self.generation.load(Ordering::SeqCst),
                        };
                        enqueue_request(work_tx, outbound, item);
                    }
                    Ok(Envelope::HeartbeatAck) => {
                        debug!("Heartbeat acknowledged by hub");
                    }
                    Ok(other) => {
                        debug!("Discarding unexpected {} envelope from hub", other.kind());
                    }
                    Err(e) => {
                        warn!("Malformed envelope from hub: {}", e);
                    }
                },
                Ok(Message::Close(_)) => {
                    info!("Hub closed the connection");
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => return Err(HubError::connection(e.to_string())),
            }
        }
        Ok(())
    }

    /// Drain the work queue, one item at a time, in arrival order
    async fn process_loop(self: Arc<Self>, mut work_rx: mpsc::Receiver<WorkItem>) {
        while let Some(item) = work_rx.recv().await {
            if self.settings.drain_on_disconnect
                && item.generation < self.generation.load(Ordering::SeqCst)
            {
                debug!(
                    "Discarding request {} queued before disconnect",
                    item.correlation_id
                );
                continue;
            }

            *self.state.write() = NodeState::Busy;
            let payload = self.execute(item.payload).await;
            *self.state.write() = NodeState::Idle;

            let envelope = Envelope::Response {
                id: item.correlation_id,
                data: payload,
            };
            self.deliver(item.correlation_id, envelope).await;
        }
    }

    /// Run one request through the extraction collaborator
    ///
    /// Extraction failures become a structured error payload inside a normal
    /// response; they never surface as connection-level errors.
    async fn execute(&self, payload: Value) -> Value {
        match serde_json::from_value::<ScrapeRequest>(payload) {
            Ok(request) => {
                debug!("Extracting {}", request.url);
                match self.extractor.extract(&request).await {
                    Ok(result) => serde_json::to_value(result).unwrap_or_else(|e| {
                        json!({"error": {"kind": "other", "reason": e.to_string()}})
                    }),
                    Err(error) => json!({ "error": error }),
                }
            }
            Err(e) => json!({
                "error": {"kind": "other", "reason": format!("invalid request body: {}", e)}
            }),
        }
    }

    /// Ship a response over the current connection, or over a freshly dialed
    /// one if the original dropped mid-task
    async fn deliver(&self, correlation_id: Uuid, envelope: Envelope) {
        let current = self.outbound.read().clone();
        if let Some(tx) = current {
            if tx.send(envelope.clone()).is_ok() {
                return;
            }
        }

        let hub = self.last_hub.read().clone();
        let Some(hub) = hub else {
            warn!("No hub address known, dropping response {}", correlation_id);
            return;
        };

        debug!(
            "Connection dropped mid-task, delivering response {} over a fresh connection",
            correlation_id
        );
        let url = hub.ws_url(&self.settings.node_id);
        match connect_async(url.as_str()).await {
            Ok((mut ws, _)) => {
                let text = match envelope.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Dropping unserializable response {}: {}", correlation_id, e);
                        return;
                    }
                };
                if let Err(e) = ws.send(Message::Text(text)).await {
                    warn!("Could not deliver response {}: {}", correlation_id, e);
                }
                let _ = ws.close(None).await;
            }
            Err(e) => {
                warn!("Could not deliver response {}: {}", correlation_id, e);
            }
        }
    }
}

/// Enqueue a dispatched request, rejecting with an error envelope when full
///
/// The bounded queue is the backpressure contract: rather than growing
/// without limit under burst load, the node refuses the request and the hub
/// fails the waiting caller.
fn enqueue_request(
    work_tx: &mpsc::Sender<WorkItem>,
    outbound: &mpsc::UnboundedSender<Envelope>,
    item: WorkItem,
) {
    match work_tx.try_send(item) {
        Ok(()) => {}
        Err(TrySendError::Full(item)) => {
            warn!("Work queue full, rejecting request {}", item.correlation_id);
            let _ = outbound.send(Envelope::Error {
                id: Some(item.correlation_id),
                message: "work queue full".to_string(),
            });
        }
        Err(TrySendError::Closed(item)) => {
            debug!("Work queue closed, dropping request {}", item.correlation_id);
        }
    }
}
