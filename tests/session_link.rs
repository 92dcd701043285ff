//! End-to-end session against a fake aircraft on loopback.

use std::time::Duration;

use tokio::net::UdpSocket;

use tello_link::config::Config;
use tello_link::protocol::{
    connect_request, message_id, verify, Command, Stick, STICK_MESSAGE_ID,
};
use tello_link::session::Session;

struct FakeDrone {
    socket: UdpSocket,
}

impl FakeDrone {
    async fn new() -> Self {
        Self {
            socket: UdpSocket::bind("127.0.0.1:0").await.unwrap(),
        }
    }

    async fn recv(&self, wait: Duration) -> Option<Vec<u8>> {
        let mut buf = [0u8; 128];
        match tokio::time::timeout(wait, self.socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => Some(buf[..len].to_vec()),
            _ => None,
        }
    }

    /// Everything received until the link goes quiet.
    async fn drain(&self) -> Vec<Vec<u8>> {
        let mut packets = Vec::new();
        while let Some(p) = self.recv(Duration::from_millis(100)).await {
            packets.push(p);
        }
        packets
    }
}

async fn loopback_config(drone: &FakeDrone, video: bool) -> Config {
    let mut config = Config::default();
    config.drone.command_addr = drone.socket.local_addr().unwrap();
    config.drone.video_port = 11111;
    config.transport.bind_addr = "127.0.0.1:0".parse().unwrap();
    config.video.enabled = video;
    config.video.listen_addr = "127.0.0.1:0".parse().unwrap();
    config.video.relay_addr = "127.0.0.1:9".parse().unwrap();
    config.video.recv_timeout = Duration::from_millis(50);
    config
}

#[tokio::test]
async fn test_connect_request_comes_first() {
    let drone = FakeDrone::new().await;
    let session = Session::start(&loopback_config(&drone, false).await)
        .await
        .unwrap();

    let first = drone.recv(Duration::from_secs(1)).await.unwrap();
    assert_eq!(first, connect_request(11111));
    assert_eq!(&first[..9], b"conn_req:");

    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_full_flight() {
    let drone = FakeDrone::new().await;
    let session = Session::start(&loopback_config(&drone, true).await)
        .await
        .unwrap();
    let pilot = session.pilot();

    tokio::time::sleep(Duration::from_millis(100)).await;
    pilot.set_stick(Stick::AscendSlow);
    tokio::time::sleep(Duration::from_millis(100)).await;
    pilot.request_takeoff_or_land().await.unwrap();
    assert!(session.state().is_in_flight());
    tokio::time::sleep(Duration::from_millis(100)).await;
    pilot.request_takeoff_or_land().await.unwrap();
    assert!(!session.state().is_in_flight());

    let report = session.shutdown().await.unwrap();
    let packets = drone.drain().await;

    assert_eq!(packets[0], connect_request(11111));

    let takeoff = packets
        .iter()
        .position(|p| p.as_slice() == Command::TakeOff.bytes())
        .expect("takeoff not received");
    let land = packets
        .iter()
        .position(|p| p.as_slice() == Command::Land.bytes())
        .expect("land not received");
    assert!(takeoff < land);

    let sticks: Vec<_> = packets
        .iter()
        .filter(|p| message_id(p) == Some(STICK_MESSAGE_ID))
        .collect();
    assert!(sticks.len() >= 10, "only {} stick packets", sticks.len());
    assert!(sticks.len() as u64 <= report.heartbeat.ticks);
    assert!(sticks
        .iter()
        .any(|p| Stick::from_template(p) == Some(Stick::AscendSlow)));
    // Takeoff resets the stick, so the last heartbeats hover.
    assert_eq!(
        Stick::from_template(sticks.last().unwrap()),
        Some(Stick::Hover)
    );

    let keyframes = packets
        .iter()
        .filter(|p| p.as_slice() == Command::KeyframeRequest.bytes())
        .count();
    assert!(keyframes >= 1);

    for packet in &packets[1..] {
        verify(packet).unwrap();
    }

    assert_eq!(report.relay, Some(Default::default()));
    assert!(report.relay_error.is_none());
}

#[tokio::test]
async fn test_stop_silences_the_link() {
    let drone = FakeDrone::new().await;
    let session = Session::start(&loopback_config(&drone, false).await)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(60)).await;
    session.pilot().request_stop();
    let report = session.wait().await.unwrap();
    assert!(report.heartbeat.ticks >= 2);

    drone.drain().await;
    assert_eq!(drone.recv(Duration::from_millis(200)).await, None);
}

#[tokio::test]
async fn test_relay_port_clash_fails_before_contact() {
    let drone = FakeDrone::new().await;
    let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let mut config = loopback_config(&drone, true).await;
    config.video.listen_addr = taken.local_addr().unwrap();
    config.transport.reuse_addr = false;

    assert!(Session::start(&config).await.is_err());
    assert_eq!(drone.recv(Duration::from_millis(100)).await, None);
}
