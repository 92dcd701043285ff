//! Stick heartbeat.
//!
//! The aircraft expects a stick packet every 20 ms and lands itself when they
//! stop arriving, so this is the latency-critical loop of the crate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use super::{PeriodicJob, SchedulerHandle};
use crate::control::ControlState;
use crate::error::Result;
use crate::protocol::encode_stick_now;
use crate::transport::CommandSink;

/// Stamps the current stick intent and sends it.
pub struct Heartbeat {
    state: Arc<ControlState>,
    sink: Arc<dyn CommandSink>,
}

impl Heartbeat {
    pub fn new(state: Arc<ControlState>, sink: Arc<dyn CommandSink>) -> Self {
        Self { state, sink }
    }
}

#[async_trait]
impl PeriodicJob for Heartbeat {
    fn name(&self) -> &'static str {
        "heartbeat"
    }

    async fn tick(&mut self) -> Result<()> {
        let stick = self.state.stick();
        let packet = encode_stick_now(stick);
        trace!(%stick, "Heartbeat");
        self.sink.send(&packet).await
    }
}

/// Start the heartbeat; it stops with the control state's stop signal.
pub fn spawn_heartbeat(
    state: Arc<ControlState>,
    sink: Arc<dyn CommandSink>,
    period: Duration,
) -> SchedulerHandle {
    let stop = state.stop_token();
    super::spawn(Heartbeat::new(state, sink), period, stop)
}
