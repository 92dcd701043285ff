//! Command transport.
//!
//! Commands are fire-and-forget UDP datagrams. Nothing is retried here: the
//! heartbeat re-sends current intent every tick, and a lost keyframe request is
//! repeated on the next second.

mod socket;
mod udp;

pub use socket::{bind_tokio_udp, create_udp_socket, SocketConfig};
pub use udp::UdpCommandTransport;

use std::net::SocketAddr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::Command;

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Local address for the command socket.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Interface to bind sockets to (Linux only).
    #[serde(default)]
    pub interface: Option<String>,

    /// Send buffer size in bytes.
    #[serde(default = "default_send_buffer")]
    pub send_buffer_size: usize,

    /// Receive buffer size in bytes.
    #[serde(default = "default_recv_buffer")]
    pub recv_buffer_size: usize,

    /// Enable SO_REUSEADDR.
    #[serde(default = "default_reuse_addr")]
    pub reuse_addr: bool,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0u8; 4], 0))
}
fn default_send_buffer() -> usize {
    256 * 1024
}
fn default_recv_buffer() -> usize {
    1024 * 1024
} // 1 MB, video bursts
fn default_reuse_addr() -> bool {
    true
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            interface: None,
            send_buffer_size: default_send_buffer(),
            recv_buffer_size: default_recv_buffer(),
            reuse_addr: default_reuse_addr(),
        }
    }
}

/// Destination for command packets.
#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Transmit one fully formed packet.
    async fn send(&self, packet: &[u8]) -> Result<()>;

    /// Transmit a static catalog command.
    async fn send_command(&self, command: Command) -> Result<()> {
        self.send(command.bytes()).await
    }

    /// Release the underlying socket. Later sends fail with `TransportError::Closed`.
    fn close(&self);

    /// Whether `close` has been called.
    fn is_closed(&self) -> bool;

    /// Get transport type name.
    fn transport_type(&self) -> &'static str;
}
