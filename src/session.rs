//! Session supervisor.
//!
//! A [`Session`] owns every actor talking to one aircraft: the stick heartbeat,
//! the keyframe requester and, when enabled, the video relay. All of them share
//! one [`ControlState`] and stop on its stop signal.

use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::control::{ControlState, Pilot};
use crate::error::{Error, Result};
use crate::protocol::connect_request;
use crate::relay::{RelayReport, RelayStats, VideoRelay};
use crate::scheduler::{spawn_heartbeat, spawn_keyframe, SchedulerHandle, SchedulerReport};
use crate::transport::{CommandSink, UdpCommandTransport};

/// Final counters of a finished session.
#[derive(Debug)]
pub struct SessionReport {
    pub heartbeat: SchedulerReport,
    pub keyframe: SchedulerReport,
    /// `None` when video was disabled.
    pub relay: Option<RelayReport>,
    /// Set when the relay ended on a socket failure rather than a stop.
    pub relay_error: Option<String>,
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "heartbeat {} sent / {} failed, keyframe {} sent / {} failed",
            self.heartbeat.ticks,
            self.heartbeat.failures,
            self.keyframe.ticks,
            self.keyframe.failures
        )?;
        if let Some(relay) = &self.relay {
            write!(
                f,
                ", video {} forwarded / {} dropped",
                relay.forwarded, relay.dropped
            )?;
        }
        Ok(())
    }
}

struct RelayTask {
    stats: Arc<RelayStats>,
    task: JoinHandle<Result<RelayReport>>,
}

/// A running link to one aircraft.
pub struct Session {
    state: Arc<ControlState>,
    sink: Arc<dyn CommandSink>,
    heartbeat: SchedulerHandle,
    keyframe: SchedulerHandle,
    relay: Option<RelayTask>,
}

impl Session {
    /// Bind the command socket to the configured aircraft and start every actor.
    pub async fn start(config: &Config) -> Result<Self> {
        let transport = UdpCommandTransport::bind(config.drone.command_addr, &config.transport)?;
        info!(
            drone = %transport.target(),
            local = %transport.local_addr(),
            "Command transport ready"
        );
        Self::start_with_sink(config, Arc::new(transport)).await
    }

    /// Start every actor on an existing command sink.
    ///
    /// The relay sockets are bound before anything is sent so a port clash
    /// fails the session before the aircraft is contacted.
    pub async fn start_with_sink(config: &Config, sink: Arc<dyn CommandSink>) -> Result<Self> {
        config.validate()?;

        let relay = if config.video.enabled {
            Some(VideoRelay::bind(&config.video, &config.transport)?)
        } else {
            None
        };

        sink.send(&connect_request(config.drone.video_port)).await?;
        info!(video_port = config.drone.video_port, "Connection requested");

        let state = Arc::new(ControlState::new());
        let heartbeat = spawn_heartbeat(
            Arc::clone(&state),
            Arc::clone(&sink),
            config.timing.heartbeat_interval,
        );
        let keyframe = spawn_keyframe(
            Arc::clone(&sink),
            config.timing.keyframe_interval,
            state.stop_token(),
        );
        let relay = relay.map(|relay| RelayTask {
            stats: relay.stats(),
            task: relay.spawn(state.stop_token()),
        });

        info!(video = relay.is_some(), "Session started");

        Ok(Self {
            state,
            sink,
            heartbeat,
            keyframe,
            relay,
        })
    }

    /// A new handle for an input source.
    pub fn pilot(&self) -> Pilot {
        Pilot::new(Arc::clone(&self.state), Arc::clone(&self.sink))
    }

    pub fn state(&self) -> &Arc<ControlState> {
        &self.state
    }

    pub fn heartbeat(&self) -> &SchedulerHandle {
        &self.heartbeat
    }

    pub fn keyframe(&self) -> &SchedulerHandle {
        &self.keyframe
    }

    /// Request stop and wait for every actor.
    pub async fn shutdown(self) -> Result<SessionReport> {
        self.state.request_stop();
        self.wait().await
    }

    /// Wait for every actor after someone else requested stop.
    pub async fn wait(self) -> Result<SessionReport> {
        let Self {
            heartbeat,
            keyframe,
            relay,
            ..
        } = self;

        let heartbeat = heartbeat.join().await?;
        let keyframe = keyframe.join().await?;

        let (relay, relay_error) = match relay {
            None => (None, None),
            Some(RelayTask { stats, task }) => {
                let outcome = task
                    .await
                    .map_err(|e| Error::TaskFailed(format!("video relay: {e}")))?;
                match outcome {
                    Ok(report) => (Some(report), None),
                    Err(e) => {
                        warn!(error = %e, "Video relay ended early");
                        (Some(stats.report()), Some(e.to_string()))
                    }
                }
            }
        };

        let report = SessionReport {
            heartbeat,
            keyframe,
            relay,
            relay_error,
        };
        info!(%report, "Session finished");
        Ok(report)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("heartbeat", &self.heartbeat)
            .field("keyframe", &self.keyframe)
            .field("video", &self.relay.is_some())
            .finish_non_exhaustive()
    }
}
