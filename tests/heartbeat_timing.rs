//! Heartbeat and keyframe scheduler timing.
//!
//! Runs on tokio's paused clock so tick counts are deterministic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use tello_link::control::{ControlState, Pilot};
use tello_link::error::{Result, TransportError};
use tello_link::protocol::{
    message_id, verify, Command, Stick, LEN_LONG, STICK_MESSAGE_ID,
};
use tello_link::scheduler::{spawn_heartbeat, spawn_keyframe, SchedulerState};
use tello_link::transport::CommandSink;
use tello_link::{HEARTBEAT_INTERVAL, KEYFRAME_INTERVAL};

// ============================================================================
// Test Infrastructure
// ============================================================================

#[derive(Default)]
struct Recorder {
    sent: Mutex<Vec<Vec<u8>>>,
    closed: AtomicBool,
    failing: AtomicBool,
}

impl Recorder {
    fn len(&self) -> usize {
        self.sent.lock().len()
    }

    fn last(&self) -> Option<Vec<u8>> {
        self.sent.lock().last().cloned()
    }

    fn packets(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl CommandSink for Recorder {
    async fn send(&self, packet: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(TransportError::Closed.into());
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed("network unreachable".into()).into());
        }
        self.sent.lock().push(packet.to_vec());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn transport_type(&self) -> &'static str {
        "recorder"
    }
}

fn setup() -> (Arc<Recorder>, Arc<ControlState>, Pilot) {
    let sink = Arc::new(Recorder::default());
    let state = Arc::new(ControlState::new());
    let pilot = Pilot::new(Arc::clone(&state), sink.clone());
    (sink, state, pilot)
}

// ============================================================================
// Heartbeat
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_heartbeat_cadence() {
    let (sink, state, pilot) = setup();
    let heartbeat = spawn_heartbeat(state, sink.clone(), HEARTBEAT_INTERVAL);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let sent = sink.len();
    assert!((4..=6).contains(&sent), "sent {sent} packets in 100ms");

    for packet in sink.packets() {
        assert_eq!(packet.len(), LEN_LONG);
        assert_eq!(message_id(&packet), Some(STICK_MESSAGE_ID));
        assert_eq!(Stick::from_template(&packet), Some(Stick::Hover));
        verify(&packet).unwrap();
    }

    pilot.request_stop();
    heartbeat.join().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stick_change_reaches_next_tick() {
    let (sink, state, pilot) = setup();
    let heartbeat = spawn_heartbeat(state, sink.clone(), HEARTBEAT_INTERVAL);

    tokio::time::sleep(Duration::from_millis(30)).await;
    pilot.set_stick(Stick::PitchForwardFast);
    tokio::time::sleep(HEARTBEAT_INTERVAL).await;

    let last = sink.last().unwrap();
    assert_eq!(Stick::from_template(&last), Some(Stick::PitchForwardFast));

    pilot.set_stick(Stick::Hover);
    tokio::time::sleep(HEARTBEAT_INTERVAL).await;
    let last = sink.last().unwrap();
    assert_eq!(Stick::from_template(&last), Some(Stick::Hover));

    pilot.request_stop();
    heartbeat.join().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_quiescent() {
    let (sink, state, pilot) = setup();
    let heartbeat = spawn_heartbeat(state, sink.clone(), HEARTBEAT_INTERVAL);
    let mut watch = heartbeat.subscribe();

    tokio::time::sleep(Duration::from_millis(50)).await;
    pilot.request_stop();

    tokio::time::timeout(
        Duration::from_millis(40),
        watch.wait_for(|s| *s == SchedulerState::Stopped),
    )
    .await
    .expect("heartbeat did not stop within two periods")
    .unwrap();

    let report = heartbeat.join().await.unwrap();
    let sent = sink.len();
    assert_eq!(sent as u64, report.ticks);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(sink.len(), sent, "packets sent after stop");
}

#[tokio::test(start_paused = true)]
async fn test_send_failures_are_tolerated() {
    let (sink, state, pilot) = setup();
    let heartbeat = spawn_heartbeat(state, sink.clone(), HEARTBEAT_INTERVAL);

    tokio::time::sleep(Duration::from_millis(30)).await;
    sink.failing.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(60)).await;
    sink.failing.store(false, Ordering::SeqCst);
    let before = sink.len();
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(sink.len() > before, "heartbeat gave up after failures");
    assert_eq!(heartbeat.state(), SchedulerState::Running);

    pilot.request_stop();
    let report = heartbeat.join().await.unwrap();
    assert!(report.failures >= 2);
}

// ============================================================================
// Keyframe requests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_keyframe_cadence_and_teardown() {
    let (sink, state, pilot) = setup();
    let keyframe = spawn_keyframe(sink.clone(), KEYFRAME_INTERVAL, state.stop_token());

    tokio::time::sleep(Duration::from_millis(2500)).await;
    let packets = sink.packets();
    assert_eq!(packets.len(), 3);
    assert!(packets
        .iter()
        .all(|p| p.as_slice() == Command::KeyframeRequest.bytes()));

    pilot.request_stop();
    let report = keyframe.join().await.unwrap();
    assert_eq!(report.ticks, 3);
    assert!(sink.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_keyframe_stops_within_its_period() {
    let (sink, state, pilot) = setup();
    let keyframe = spawn_keyframe(sink.clone(), KEYFRAME_INTERVAL, state.stop_token());

    tokio::time::sleep(Duration::from_millis(100)).await;
    pilot.request_stop();

    let report = tokio::time::timeout(KEYFRAME_INTERVAL, keyframe.join())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.ticks, 1);
}
