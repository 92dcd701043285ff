//! # tello-link
//!
//! Drives a Tello-class quadcopter over its raw UDP control and video channels.
//!
//! The crate builds and checksums binary command packets, keeps the aircraft
//! airborne with a 50 Hz stick heartbeat, asks for a keyframe once a second and
//! relays the H.264 stream onward once it becomes decodable.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  set_stick / takeoff / stop   ┌──────────────────────┐
//! │ input source │ ─────────────────────────────▶│    ControlState      │
//! └──────────────┘            (Pilot)            │ stick · in_flight ·  │
//!                                                │ stop token           │
//!                                                └─────────┬────────────┘
//!                        ┌─────────────────────────────────┼──────────────┐
//!                        ▼                                 ▼              ▼
//!               ┌─────────────────┐             ┌──────────────────┐ ┌────────────┐
//!               │ Heartbeat 20 ms │             │ Keyframe 1 s     │ │ VideoRelay │
//!               └────────┬────────┘             └────────┬─────────┘ └─────┬──────┘
//!                        └──────────┬────────────────────┘                 │
//!                                   ▼                                      ▼
//!                         UdpCommandTransport ──▶ aircraft:8889     local consumer
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]              // ASCII diagrams in docs
#![allow(clippy::unreadable_literal)]        // Protocol bytes read as captured
#![allow(clippy::cast_possible_truncation)]  // Clock fields always fit a byte
#![allow(clippy::use_self)]
#![allow(clippy::redundant_pub_crate)]
#![allow(clippy::future_not_send)]
#![allow(clippy::match_same_arms)]

pub mod config;
pub mod control;
pub mod error;
pub mod protocol;
pub mod relay;
pub mod scheduler;
pub mod session;
pub mod transport;

#[cfg(feature = "cli")]
pub mod cli;

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

pub use config::Config;
pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Aircraft address on its own access point.
pub const DRONE_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 10, 1));

/// Address the aircraft hands to its first client.
pub const LOCAL_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 10, 2));

/// Aircraft command port.
pub const COMMAND_PORT: u16 = 8889;

/// Port the aircraft streams video to.
pub const VIDEO_PORT: u16 = 6038;

/// Default port for the relayed stream.
pub const RELAY_PORT: u16 = 8080;

/// Largest video datagram the aircraft emits.
pub const MAX_VIDEO_DATAGRAM: usize = 4096;

/// Stick heartbeat cadence. The aircraft lands itself if this lapses.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(20);

/// Keyframe request cadence.
pub const KEYFRAME_INTERVAL: Duration = Duration::from_secs(1);

/// Video receive wait before re-checking for shutdown.
pub const VIDEO_RECV_TIMEOUT: Duration = Duration::from_millis(500);

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::control::{ControlState, FlightAction, Pilot};
    pub use crate::error::{Error, Result};
    pub use crate::protocol::{Command, Stick};
    pub use crate::relay::VideoRelay;
    pub use crate::scheduler::{SchedulerHandle, SchedulerState};
    pub use crate::session::{Session, SessionReport};
    pub use crate::transport::{CommandSink, UdpCommandTransport};
}
