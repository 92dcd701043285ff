//! UDP command transport.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::net::UdpSocket as TokioUdpSocket;
use tracing::{debug, trace};

use super::{CommandSink, SocketConfig, TransportConfig};
use crate::error::{Result, TransportError};
use crate::protocol::LEN_LONG;

/// Sends command datagrams to the aircraft's fixed command endpoint.
pub struct UdpCommandTransport {
    socket: RwLock<Option<Arc<TokioUdpSocket>>>,
    target: SocketAddr,
    local_addr: SocketAddr,
    packets_sent: AtomicU64,
}

impl UdpCommandTransport {
    /// Bind a command socket aimed at `target`.
    pub fn bind(target: SocketAddr, config: &TransportConfig) -> Result<Self> {
        // Match the bind family to the target.
        let bind = match (target.is_ipv6(), config.bind_addr.is_ipv6()) {
            (true, false) => SocketAddr::from(([0u16; 8], config.bind_addr.port())),
            _ => config.bind_addr,
        };

        let socket_config = SocketConfig::from_transport_config(config);
        let socket = super::bind_tokio_udp(bind, &socket_config)?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| TransportError::SocketError(e.to_string()))?;

        debug!(local = %local_addr, target = %target, "Command socket bound");

        Ok(Self {
            socket: RwLock::new(Some(Arc::new(socket))),
            target,
            local_addr,
            packets_sent: AtomicU64::new(0),
        })
    }

    /// Aircraft command endpoint.
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Local address the command socket was bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Datagrams successfully handed to the kernel.
    pub fn packets_sent(&self) -> u64 {
        self.packets_sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CommandSink for UdpCommandTransport {
    async fn send(&self, packet: &[u8]) -> Result<()> {
        if packet.len() > LEN_LONG {
            return Err(TransportError::DatagramTooLarge {
                size: packet.len(),
                max: LEN_LONG,
            }
            .into());
        }

        // Clone out of the lock so it is never held across the await.
        let socket = self.socket.read().clone().ok_or(TransportError::Closed)?;

        socket
            .send_to(packet, self.target)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        trace!(len = packet.len(), target = %self.target, "Command sent");
        Ok(())
    }

    fn close(&self) {
        if self.socket.write().take().is_some() {
            debug!(target = %self.target, "Command socket released");
        }
    }

    fn is_closed(&self) -> bool {
        self.socket.read().is_none()
    }

    fn transport_type(&self) -> &'static str {
        "udp"
    }
}
