//! Keyframe requests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{PeriodicJob, SchedulerHandle};
use crate::error::Result;
use crate::protocol::Command;
use crate::transport::CommandSink;

/// Asks the video encoder for a fresh keyframe.
///
/// Owns the command socket's teardown: when it stops it closes the sink.
pub struct KeyframeRequester {
    sink: Arc<dyn CommandSink>,
}

impl KeyframeRequester {
    pub fn new(sink: Arc<dyn CommandSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl PeriodicJob for KeyframeRequester {
    fn name(&self) -> &'static str {
        "keyframe"
    }

    async fn tick(&mut self) -> Result<()> {
        self.sink.send_command(Command::KeyframeRequest).await
    }

    async fn on_stop(&mut self) {
        debug!(transport = self.sink.transport_type(), "Closing command transport");
        self.sink.close();
    }
}

/// Start the keyframe requester; it stops with `stop`.
pub fn spawn_keyframe(
    sink: Arc<dyn CommandSink>,
    period: Duration,
    stop: CancellationToken,
) -> SchedulerHandle {
    super::spawn(KeyframeRequester::new(sink), period, stop)
}
