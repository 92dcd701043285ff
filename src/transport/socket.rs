//! Low-level UDP socket creation.
//!
//! Supports binding to a named interface on Linux (SO_BINDTODEVICE), which
//! matters on hosts that reach the aircraft over a second Wi-Fi adapter.

use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket as TokioUdpSocket;
use tracing::{debug, warn};

use super::TransportConfig;
use crate::error::{Result, TransportError};

/// Socket configuration options.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    pub send_buffer_size: usize,
    pub recv_buffer_size: usize,
    pub reuse_addr: bool,
    /// Interface to bind to.
    pub bind_interface: Option<String>,
}

impl SocketConfig {
    /// Create from transport config.
    pub fn from_transport_config(config: &TransportConfig) -> Self {
        Self {
            send_buffer_size: config.send_buffer_size,
            recv_buffer_size: config.recv_buffer_size,
            reuse_addr: config.reuse_addr,
            bind_interface: config.interface.clone(),
        }
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            send_buffer_size: 256 * 1024,
            recv_buffer_size: 1024 * 1024,
            reuse_addr: true,
            bind_interface: None,
        }
    }
}

/// Create a bound, non-blocking UDP socket.
pub fn create_udp_socket(addr: SocketAddr, config: &SocketConfig) -> Result<Socket> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| TransportError::SocketError(e.to_string()))?;

    configure_socket(&socket, config)?;
    bind_to_interface(&socket, config)?;

    socket
        .bind(&addr.into())
        .map_err(|e| TransportError::BindFailed {
            addr,
            reason: e.to_string(),
        })?;

    socket
        .set_nonblocking(true)
        .map_err(|e| TransportError::SocketError(e.to_string()))?;

    Ok(socket)
}

/// Create a UDP socket and hand it to tokio. Must run inside a runtime.
pub fn bind_tokio_udp(addr: SocketAddr, config: &SocketConfig) -> Result<TokioUdpSocket> {
    let socket = create_udp_socket(addr, config)?;
    TokioUdpSocket::from_std(socket.into()).map_err(|e| {
        TransportError::BindFailed {
            addr,
            reason: e.to_string(),
        }
        .into()
    })
}

/// Apply common socket configuration.
fn configure_socket(socket: &Socket, config: &SocketConfig) -> Result<()> {
    // A refused buffer size is not fatal, the kernel default still works.
    if let Err(e) = socket.set_send_buffer_size(config.send_buffer_size) {
        warn!(error = %e, "Failed to set send buffer size");
    }
    if let Err(e) = socket.set_recv_buffer_size(config.recv_buffer_size) {
        warn!(error = %e, "Failed to set recv buffer size");
    }

    if config.reuse_addr {
        socket
            .set_reuse_address(true)
            .map_err(|e| TransportError::SocketError(format!("set reuse addr: {e}")))?;
    }

    Ok(())
}

/// Bind socket to a specific interface.
fn bind_to_interface(socket: &Socket, config: &SocketConfig) -> Result<()> {
    let Some(interface) = &config.bind_interface else {
        return Ok(());
    };

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "fuchsia"))]
    {
        socket
            .bind_device(Some(interface.as_bytes()))
            .map_err(|e| {
                TransportError::SocketError(format!("bind to device {interface}: {e}"))
            })?;
        debug!(interface = %interface, "Bound socket to interface");
    }

    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "fuchsia")))]
    {
        let _ = socket;
        warn!(interface = %interface, "Interface binding not supported on this platform");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_config() {
        let transport = TransportConfig {
            interface: Some("wlan0".into()),
            reuse_addr: false,
            ..Default::default()
        };
        let config = SocketConfig::from_transport_config(&transport);
        assert_eq!(config.bind_interface.as_deref(), Some("wlan0"));
        assert!(!config.reuse_addr);
    }

    #[test]
    fn test_create_udp_socket() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let socket = create_udp_socket(addr, &SocketConfig::default()).unwrap();
        let local = socket.local_addr().unwrap().as_socket().unwrap();
        assert_ne!(local.port(), 0);
    }

    #[test]
    fn test_reuse_addr_allows_rebind() {
        let config = SocketConfig::default();
        let first = create_udp_socket("127.0.0.1:0".parse().unwrap(), &config).unwrap();
        let addr = first.local_addr().unwrap().as_socket().unwrap();
        drop(first);
        assert!(create_udp_socket(addr, &config).is_ok());
    }
}
