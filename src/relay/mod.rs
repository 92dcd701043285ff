//! Video relay.
//!
//! Receives the aircraft's raw H.264 datagrams, holds everything back until the
//! first sequence parameter set arrives, then forwards each datagram minus its
//! two byte prefix to a local consumer such as a player or decoder.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket as TokioUdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::error::{Result, TransportError};
use crate::protocol::{leading_nal, GateDecision, KeyframeGate, NalUnitType};
use crate::transport::{bind_tokio_udp, SocketConfig, TransportConfig};
use crate::{LOCAL_IP, MAX_VIDEO_DATAGRAM, RELAY_PORT, VIDEO_PORT, VIDEO_RECV_TIMEOUT};

/// Video relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Run the relay at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Where the aircraft sends its stream.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Where the filtered stream goes.
    #[serde(default = "default_relay_addr")]
    pub relay_addr: SocketAddr,

    /// Receive wait before re-checking for shutdown.
    #[serde(default = "default_recv_timeout", with = "humantime_serde")]
    pub recv_timeout: Duration,

    /// Receive buffer per datagram.
    #[serde(default = "default_max_datagram")]
    pub max_datagram: usize,
}

fn default_enabled() -> bool {
    true
}
fn default_listen_addr() -> SocketAddr {
    SocketAddr::new(LOCAL_IP, VIDEO_PORT)
}
fn default_relay_addr() -> SocketAddr {
    SocketAddr::new(LOCAL_IP, RELAY_PORT)
}
fn default_recv_timeout() -> Duration {
    VIDEO_RECV_TIMEOUT
}
fn default_max_datagram() -> usize {
    MAX_VIDEO_DATAGRAM
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            listen_addr: default_listen_addr(),
            relay_addr: default_relay_addr(),
            recv_timeout: default_recv_timeout(),
            max_datagram: default_max_datagram(),
        }
    }
}

/// Live relay counters.
#[derive(Debug, Default)]
pub struct RelayStats {
    received: AtomicU64,
    dropped: AtomicU64,
    forwarded: AtomicU64,
    bytes_forwarded: AtomicU64,
    sps_seen: AtomicU64,
}

impl RelayStats {
    pub fn report(&self) -> RelayReport {
        RelayReport {
            received: self.received.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            bytes_forwarded: self.bytes_forwarded.load(Ordering::Relaxed),
            sps_seen: self.sps_seen.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`RelayStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    /// Datagrams received from the aircraft.
    pub received: u64,
    /// Datagrams discarded while waiting for the first SPS.
    pub dropped: u64,
    /// Datagrams relayed.
    pub forwarded: u64,
    /// Payload bytes relayed.
    pub bytes_forwarded: u64,
    /// Datagrams that opened a sequence parameter set.
    pub sps_seen: u64,
}

/// Gated relay from the aircraft's video port to a local consumer.
pub struct VideoRelay {
    listen: TokioUdpSocket,
    forward: TokioUdpSocket,
    relay_addr: SocketAddr,
    recv_timeout: Duration,
    max_datagram: usize,
    gate: KeyframeGate,
    stats: Arc<RelayStats>,
}

impl VideoRelay {
    /// Bind both sockets. Must run inside a tokio runtime.
    pub fn bind(config: &VideoConfig, transport: &TransportConfig) -> Result<Self> {
        let socket_config = SocketConfig::from_transport_config(transport);
        let listen = bind_tokio_udp(config.listen_addr, &socket_config)?;

        let forward_bind = if config.relay_addr.is_ipv6() {
            SocketAddr::from(([0u16; 8], 0))
        } else {
            SocketAddr::from(([0u8; 4], 0))
        };
        // The consumer is local; never pin the forward socket to the drone interface.
        let forward_config = SocketConfig {
            bind_interface: None,
            ..socket_config
        };
        let forward = bind_tokio_udp(forward_bind, &forward_config)?;

        Ok(Self {
            listen,
            forward,
            relay_addr: config.relay_addr,
            recv_timeout: config.recv_timeout,
            max_datagram: config.max_datagram,
            gate: KeyframeGate::new(),
            stats: Arc::new(RelayStats::default()),
        })
    }

    /// Address the relay listens on.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listen
            .local_addr()
            .map_err(|e| TransportError::SocketError(e.to_string()).into())
    }

    /// Consumer address.
    pub fn relay_addr(&self) -> SocketAddr {
        self.relay_addr
    }

    /// Shared handle to the live counters.
    pub fn stats(&self) -> Arc<RelayStats> {
        Arc::clone(&self.stats)
    }

    /// Run on a background task.
    pub fn spawn(self, stop: CancellationToken) -> JoinHandle<Result<RelayReport>> {
        tokio::spawn(self.run(stop))
    }

    /// Relay until `stop` fires or a socket fails.
    ///
    /// Receive timeouts are not errors. Both sockets are released on return.
    pub async fn run(mut self, stop: CancellationToken) -> Result<RelayReport> {
        let mut buf = vec![0u8; self.max_datagram];
        let listen_addr = self.local_addr()?;
        info!(listen = %listen_addr, relay = %self.relay_addr, "Video relay running");

        let result = loop {
            let received = tokio::select! {
                biased;
                () = stop.cancelled() => break Ok(()),
                r = tokio::time::timeout(self.recv_timeout, self.listen.recv_from(&mut buf)) => r,
            };

            let len = match received {
                Err(_) => {
                    trace!("Video receive timed out");
                    continue;
                }
                Ok(Err(e)) => break Err(TransportError::ReceiveFailed(e.to_string()).into()),
                Ok(Ok((len, _))) => len,
            };

            if let Err(e) = self.handle_datagram(&buf[..len]).await {
                break Err(e);
            }
        };

        let report = self.stats.report();
        match &result {
            Ok(()) => info!(
                forwarded = report.forwarded,
                dropped = report.dropped,
                "Video relay stopped"
            ),
            Err(e) => error!(error = %e, "Video relay terminated"),
        }

        result.map(|()| report)
    }

    async fn handle_datagram(&mut self, datagram: &[u8]) -> Result<()> {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        let nal = leading_nal(datagram);
        if nal == Some(NalUnitType::Sps) {
            self.stats.sps_seen.fetch_add(1, Ordering::Relaxed);
            if !self.gate.is_open() {
                info!(len = datagram.len(), "First SPS observed, relaying video");
            }
        }

        match self.gate.admit(datagram) {
            GateDecision::Drop => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(len = datagram.len(), nal = ?nal, "Dropped before keyframe");
            }
            GateDecision::Forward(payload) => {
                self.forward
                    .send_to(payload, self.relay_addr)
                    .await
                    .map_err(|e| TransportError::SendFailed(e.to_string()))?;
                self.stats.forwarded.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .bytes_forwarded
                    .fetch_add(payload.len() as u64, Ordering::Relaxed);
            }
        }

        Ok(())
    }
}
