//! Video relay over loopback UDP.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tello_link::error::Result;
use tello_link::relay::{RelayReport, VideoConfig, VideoRelay};
use tello_link::transport::TransportConfig;

// ============================================================================
// Test Infrastructure
// ============================================================================

struct Harness {
    camera: UdpSocket,
    consumer: UdpSocket,
    relay_addr: SocketAddr,
    stop: CancellationToken,
    task: JoinHandle<Result<RelayReport>>,
}

impl Harness {
    async fn new() -> Self {
        let consumer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = VideoConfig {
            enabled: true,
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            relay_addr: consumer.local_addr().unwrap(),
            recv_timeout: Duration::from_millis(50),
            max_datagram: 4096,
        };

        let relay = VideoRelay::bind(&config, &TransportConfig::default()).unwrap();
        let relay_addr = relay.local_addr().unwrap();
        let stop = CancellationToken::new();
        let task = relay.spawn(stop.clone());

        let camera = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        Self {
            camera,
            consumer,
            relay_addr,
            stop,
            task,
        }
    }

    async fn send(&self, datagram: &[u8]) {
        self.camera.send_to(datagram, self.relay_addr).await.unwrap();
    }

    async fn recv(&self, wait: Duration) -> Option<Vec<u8>> {
        let mut buf = [0u8; 4096];
        match tokio::time::timeout(wait, self.consumer.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => Some(buf[..len].to_vec()),
            _ => None,
        }
    }

    async fn finish(self) -> RelayReport {
        self.stop.cancel();
        self.task.await.unwrap().unwrap()
    }
}

/// Prefix, start code, NAL header, payload.
fn datagram(nal_header: u8, payload: &[u8]) -> Vec<u8> {
    let mut d = vec![0x5a, 0xa5, 0x00, 0x00, 0x00, 0x01, nal_header];
    d.extend_from_slice(payload);
    d
}

const SLICE: u8 = 0x41;
const IDR: u8 = 0x65;
const SPS: u8 = 0x67;
const PPS: u8 = 0x68;

// ============================================================================
// Gate
// ============================================================================

#[tokio::test]
async fn test_nothing_forwarded_before_sps() {
    let h = Harness::new().await;

    h.send(&datagram(SLICE, &[1, 2, 3])).await;
    h.send(&datagram(IDR, &[4, 5, 6])).await;
    h.send(&datagram(PPS, &[7])).await;
    h.send(&[0x00, 0x01]).await;

    assert_eq!(h.recv(Duration::from_millis(200)).await, None);

    let report = h.finish().await;
    assert_eq!(report.received, 4);
    assert_eq!(report.dropped, 4);
    assert_eq!(report.forwarded, 0);
}

#[tokio::test]
async fn test_sps_opens_gate_and_strips_prefix() {
    let h = Harness::new().await;

    h.send(&datagram(SLICE, &[0xee])).await;
    let sps = datagram(SPS, &[0x42, 0x00, 0x1f]);
    assert_eq!(sps.len(), 10);
    h.send(&sps).await;

    let first = h.recv(Duration::from_secs(1)).await.unwrap();
    assert_eq!(first, sps[2..10].to_vec());

    let report = h.finish().await;
    assert_eq!(report.dropped, 1);
    assert_eq!(report.forwarded, 1);
    assert_eq!(report.sps_seen, 1);
    assert_eq!(report.bytes_forwarded, 8);
}

#[tokio::test]
async fn test_gate_stays_open_and_order_is_kept() {
    let h = Harness::new().await;

    h.send(&datagram(SPS, &[0x42])).await;
    // Continuation fragments carry no start code and are still relayed.
    let follow: Vec<Vec<u8>> = vec![
        datagram(PPS, &[0xce]),
        datagram(IDR, &[0x88, 0x84]),
        vec![0x5a, 0xa5, 0xde, 0xad, 0xbe, 0xef, 0x01, 0x02],
        datagram(SLICE, &[0x9a]),
    ];
    for d in &follow {
        h.send(d).await;
    }

    let mut got = Vec::new();
    while let Some(d) = h.recv(Duration::from_millis(300)).await {
        got.push(d);
        if got.len() == 5 {
            break;
        }
    }

    assert_eq!(got.len(), 5);
    assert_eq!(got[0], datagram(SPS, &[0x42])[2..].to_vec());
    for (forwarded, sent) in got[1..].iter().zip(&follow) {
        assert_eq!(forwarded.as_slice(), &sent[2..]);
    }

    let report = h.finish().await;
    assert_eq!(report.forwarded, 5);
    assert_eq!(report.dropped, 0);
}

#[tokio::test]
async fn test_short_sps_does_not_open_gate() {
    let h = Harness::new().await;

    // Six bytes: the NAL header sits at index 6, so this cannot be classified.
    h.send(&[0x5a, 0xa5, 0x00, 0x00, 0x00, 0x01]).await;
    h.send(&datagram(SLICE, &[1])).await;
    assert_eq!(h.recv(Duration::from_millis(200)).await, None);

    let report = h.finish().await;
    assert_eq!(report.dropped, 2);
}

#[tokio::test]
async fn test_prefix_only_datagram_forwarded_empty() {
    let h = Harness::new().await;

    h.send(&datagram(SPS, &[0x42])).await;
    h.send(&[0x5a, 0xa5]).await;
    h.send(&[0x5a, 0xa5, 0x09]).await;

    let first = h.recv(Duration::from_secs(1)).await.unwrap();
    let second = h.recv(Duration::from_secs(1)).await.unwrap();
    let third = h.recv(Duration::from_secs(1)).await.unwrap();
    assert_eq!(first[4], SPS);
    assert!(second.is_empty());
    assert_eq!(third, vec![0x09]);

    let report = h.finish().await;
    assert_eq!(report.received, 3);
    assert_eq!(report.forwarded, 3);
    assert_eq!(report.received, report.dropped + report.forwarded);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_idle_relay_stops_promptly() {
    let h = Harness::new().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let report = tokio::time::timeout(Duration::from_millis(500), h.finish())
        .await
        .expect("relay did not observe stop");
    assert_eq!(report, RelayReport::default());
}
