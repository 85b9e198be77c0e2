//! Periodic UDP broadcast of the hub's node endpoint
//!
//! Runs as an independent background task with no shared server state: the
//! advertised address is determined once at startup, then the record is sent
//! on a fixed interval until the process exits. Nothing is read back.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::config::DiscoverySettings;

use super::record::HubAddress;

/// Broadcasts the hub address on the well-known discovery port
pub struct HubBroadcaster {
    record: HubAddress,
    broadcast_port: u16,
    interval: Duration,
}

impl HubBroadcaster {
    pub fn new(settings: &DiscoverySettings, record: HubAddress) -> Self {
        Self {
            record,
            broadcast_port: settings.broadcast_port,
            interval: Duration::from_secs(settings.interval_secs),
        }
    }

    /// Start the free-running broadcast task
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let socket = match UdpSocket::bind(("0.0.0.0", 0)).await {
                Ok(socket) => socket,
                Err(e) => {
                    error!("Discovery broadcaster could not bind a socket: {}", e);
                    return;
                }
            };
            if let Err(e) = socket.set_broadcast(true) {
                error!("Discovery broadcaster could not enable broadcast: {}", e);
                return;
            }

            let record = self.record.to_string();
            let target = (Ipv4Addr::BROADCAST, self.broadcast_port);
            info!(
                "Broadcasting {:?} on UDP port {} every {:?}",
                record, self.broadcast_port, self.interval
            );

            let mut interval = time::interval(self.interval);
            loop {
                interval.tick().await;
                if let Err(e) = socket.send_to(record.as_bytes(), target).await {
                    // best effort; the next tick retries
                    warn!("Broadcast send failed: {}", e);
                } else {
                    debug!("Broadcast {:?}", record);
                }
            }
        })
    }
}

/// Best-effort detection of the local address a default route would use
///
/// Opens a UDP socket towards a public address without sending anything and
/// reads the chosen source address back. Multi-interface hosts should set
/// `hub.advertise_host` explicitly instead of relying on this.
pub fn detect_local_addr() -> Option<IpAddr> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect(("8.8.8.8", 80)).ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}
