//! Node-side discovery: wait for a hub announcement on the broadcast port

use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::models::HubResult;

use super::record::HubAddress;

/// Listen on the broadcast port until a valid hub announcement arrives
///
/// Datagrams that do not parse as a broadcast record are ignored; the first
/// valid record wins.
pub async fn await_hub_announcement(broadcast_port: u16) -> HubResult<HubAddress> {
    let socket = UdpSocket::bind(("0.0.0.0", broadcast_port)).await?;
    info!("Listening for hub announcements on UDP port {}", broadcast_port);

    let mut buf = [0u8; 256];
    loop {
        let (len, peer) = socket.recv_from(&mut buf).await?;
        let record = match std::str::from_utf8(&buf[..len]) {
            Ok(text) => text.trim(),
            Err(_) => {
                debug!("Ignoring non-UTF-8 broadcast from {}", peer);
                continue;
            }
        };

        match record.parse::<HubAddress>() {
            Ok(address) => {
                info!("Discovered hub at {}:{} (announced by {})", address.host, address.port, peer);
                return Ok(address);
            }
            Err(_) => {
                debug!("Ignoring unrecognized broadcast {:?} from {}", record, peer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    // Loopback round-trip through real UDP sockets on an ephemeral-ish port.
    #[tokio::test]
    async fn test_listener_skips_noise_and_returns_first_valid_record() {
        let port = 39417; // unlikely to collide in CI
        let listener = tokio::spawn(await_hub_announcement(port));

        // resend until the listener picks it up, in case it binds late
        let sender = tokio::spawn(async move {
            let socket = UdpSocket::bind(("127.0.0.1", 0)).await.unwrap();
            let target = ("127.0.0.1", port);
            loop {
                let _ = socket.send_to(b"not a record", target).await;
                let _ = socket.send_to(b"hub:10.0.0.5:8001", target).await;
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        });

        let discovered = tokio::time::timeout(Duration::from_secs(5), listener)
            .await
            .expect("discovery timed out")
            .unwrap()
            .unwrap();
        sender.abort();

        assert_eq!(discovered, HubAddress::new("10.0.0.5", 8001));
    }
}
