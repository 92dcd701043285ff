//! Shared control state and the operator-facing input surface.
//!
//! `ControlState` is read by the heartbeat fifty times a second while the input
//! source writes it. Every field is a single atomic so a read can never tear;
//! cross-field consistency is not needed, a one-tick-stale stick is harmless.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::Result;
use crate::protocol::{Command, Stick};
use crate::transport::CommandSink;

/// State shared by the input source, the schedulers and the video relay.
#[derive(Debug)]
pub struct ControlState {
    stick: AtomicU8,
    in_flight: AtomicBool,
    stop: CancellationToken,
}

impl ControlState {
    /// Hovering, grounded, running.
    pub fn new() -> Self {
        Self {
            stick: AtomicU8::new(Stick::Hover.as_u8()),
            in_flight: AtomicBool::new(false),
            stop: CancellationToken::new(),
        }
    }

    /// Current stick intent.
    pub fn stick(&self) -> Stick {
        // Only valid tags are ever stored.
        Stick::from_u8(self.stick.load(Ordering::Acquire)).unwrap_or_default()
    }

    pub(crate) fn set_stick(&self, stick: Stick) {
        self.stick.store(stick.as_u8(), Ordering::Release);
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub(crate) fn set_in_flight(&self, in_flight: bool) {
        self.in_flight.store(in_flight, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Raise the stop signal. Irreversible; repeated calls are no-ops.
    pub(crate) fn request_stop(&self) {
        if !self.stop.is_cancelled() {
            info!("Stop requested");
        }
        self.stop.cancel();
    }

    /// Token every actor selects on to observe the stop signal.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Resolves once stop has been requested.
    pub async fn stopped(&self) {
        self.stop.cancelled().await;
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}

/// Action taken by a takeoff/land toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightAction {
    TakeOff,
    Land,
}

impl FlightAction {
    pub fn command(self) -> Command {
        match self {
            Self::TakeOff => Command::TakeOff,
            Self::Land => Command::Land,
        }
    }
}

impl fmt::Display for FlightAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TakeOff => write!(f, "takeoff"),
            Self::Land => write!(f, "land"),
        }
    }
}

/// The only mutation path into [`ControlState`].
///
/// Handed to whatever supplies operator intent: a keyboard loop, a gamepad
/// bridge or a visual tracker.
#[derive(Clone)]
pub struct Pilot {
    state: Arc<ControlState>,
    sink: Arc<dyn CommandSink>,
}

impl Pilot {
    pub fn new(state: Arc<ControlState>, sink: Arc<dyn CommandSink>) -> Self {
        Self { state, sink }
    }

    /// Read-only view of the shared state.
    pub fn state(&self) -> &ControlState {
        &self.state
    }

    /// Replace the stick intent sent on the next heartbeat.
    pub fn set_stick(&self, stick: Stick) {
        let previous = self.state.stick();
        self.state.set_stick(stick);
        if previous != stick {
            debug!(from = %previous, to = %stick, "Stick changed");
        }
    }

    /// Take off when grounded, land when airborne.
    ///
    /// The stick drops back to hover either way. The in-flight flag only flips
    /// once the command has been handed to the socket.
    pub async fn request_takeoff_or_land(&self) -> Result<FlightAction> {
        let action = if self.state.is_in_flight() {
            FlightAction::Land
        } else {
            FlightAction::TakeOff
        };

        self.state.set_stick(Stick::Hover);
        self.sink.send_command(action.command()).await?;
        self.state.set_in_flight(action == FlightAction::TakeOff);

        info!(action = %action, "Flight command sent");
        Ok(action)
    }

    /// Signal every actor to wind down.
    pub fn request_stop(&self) {
        self.state.request_stop();
    }
}

impl fmt::Debug for Pilot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pilot")
            .field("state", &self.state)
            .field("transport", &self.sink.transport_type())
            .finish()
    }
}
