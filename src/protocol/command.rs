//! Command catalog.
//!
//! Every byte here was captured from the vendor app and cannot be derived, so
//! the tables are plain data. Static commands already carry their checksum;
//! stick templates stop right before the timestamp field.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{LEN_LONG, LEN_MED, LEN_SHORT, STICK_TEMPLATE_LEN};
use crate::error::ProtocolError;
use crate::VIDEO_PORT;

const CONNECT_PREFIX: &[u8; 9] = b"conn_req:";

/// Build the connection request announcing the local video port.
pub const fn connect_request(video_port: u16) -> [u8; LEN_SHORT] {
    let port = video_port.to_le_bytes();
    let mut out = [0u8; LEN_SHORT];
    let mut i = 0;
    while i < CONNECT_PREFIX.len() {
        out[i] = CONNECT_PREFIX[i];
        i += 1;
    }
    out[9] = port[0];
    out[10] = port[1];
    out
}

/// Connection request for the default video port.
pub const CONNECT_REQUEST: [u8; LEN_SHORT] = connect_request(VIDEO_PORT);

const KEYFRAME_REQUEST: [u8; LEN_SHORT] = [
    0xcc, 0x58, 0x00, 0x7c, 0x60, 0x25, 0x00, 0x00, 0x00, 0x6c, 0x95,
];

const TAKE_OFF: [u8; LEN_SHORT] = [
    0xcc, 0x58, 0x00, 0x7c, 0x68, 0x54, 0x00, 0xe4, 0x01, 0xc2, 0x16,
];

const LAND: [u8; LEN_MED] = [
    0xcc, 0x60, 0x00, 0x27, 0x68, 0x55, 0x00, 0xe5, 0x01, 0x00, 0xba, 0xc7,
];

/// Fully formed commands that need no per-send mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    /// Session handshake, carries the video port.
    ConnectRequest,
    /// Take off from the ground.
    TakeOff,
    /// Land in place.
    Land,
    /// Ask the encoder for a fresh SPS/PPS + IDR.
    KeyframeRequest,
}

impl Command {
    /// Wire bytes for this command.
    pub fn bytes(self) -> &'static [u8] {
        match self {
            Self::ConnectRequest => &CONNECT_REQUEST,
            Self::TakeOff => &TAKE_OFF,
            Self::Land => &LAND,
            Self::KeyframeRequest => &KEYFRAME_REQUEST,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectRequest => write!(f, "connect-request"),
            Self::TakeOff => write!(f, "takeoff"),
            Self::Land => write!(f, "land"),
            Self::KeyframeRequest => write!(f, "keyframe-request"),
        }
    }
}

type Template = [u8; STICK_TEMPLATE_LEN];

// Header shared by every stick template; bytes 9..15 carry the packed axes.
const fn stick(axes: [u8; 6]) -> Template {
    [
        0xcc, 0xb0, 0x00, 0x7f, 0x60, 0x50, 0x00, 0x00, 0x00, axes[0], axes[1], axes[2], axes[3],
        axes[4], axes[5],
    ]
}

const HOVER: Template = stick([0x00, 0x04, 0x20, 0x00, 0x01, 0x08]);
const ASCEND_FAST: Template = stick([0x00, 0x04, 0x20, 0xa5, 0x01, 0x08]);
const ASCEND_SLOW: Template = stick([0x00, 0x04, 0xa0, 0x52, 0x01, 0x08]);
const DESCEND_FAST: Template = stick([0x00, 0x04, 0x20, 0x5b, 0x00, 0x08]);
const DESCEND_SLOW: Template = stick([0x00, 0x04, 0xa0, 0xad, 0x00, 0x08]);
const YAW_CCW_FAST: Template = stick([0x00, 0x04, 0x20, 0x00, 0xd9, 0x02]);
const YAW_CCW_SLOW: Template = stick([0x00, 0x04, 0x20, 0x00, 0x6d, 0x05]);
const YAW_CW_FAST: Template = stick([0x00, 0x04, 0x20, 0x00, 0x29, 0x0d]);
const YAW_CW_SLOW: Template = stick([0x00, 0x04, 0x20, 0x00, 0x95, 0x0a]);
const PITCH_FORWARD_FAST: Template = stick([0x00, 0xa4, 0x34, 0x00, 0x01, 0x08]);
const PITCH_FORWARD_SLOW: Template = stick([0x00, 0x54, 0x2a, 0x00, 0x01, 0x08]);
const PITCH_BACK_FAST: Template = stick([0x00, 0x64, 0x0b, 0x00, 0x01, 0x08]);
const PITCH_BACK_SLOW: Template = stick([0x00, 0xb4, 0x15, 0x00, 0x01, 0x08]);
const ROLL_LEFT_FAST: Template = stick([0x6c, 0x01, 0x20, 0x00, 0x01, 0x08]);
const ROLL_LEFT_SLOW: Template = stick([0xb6, 0x02, 0x20, 0x00, 0x01, 0x08]);
const ROLL_RIGHT_FAST: Template = stick([0x94, 0x06, 0x20, 0x00, 0x01, 0x08]);
const ROLL_RIGHT_SLOW: Template = stick([0x4a, 0x05, 0x20, 0x00, 0x01, 0x08]);

/// Directional intent carried by the periodic stick packet.
///
/// The discriminant doubles as the tag stored in the shared control state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum Stick {
    #[default]
    Hover = 0,
    AscendFast = 1,
    AscendSlow = 2,
    DescendFast = 3,
    DescendSlow = 4,
    YawCcwFast = 5,
    YawCcwSlow = 6,
    YawCwFast = 7,
    YawCwSlow = 8,
    PitchForwardFast = 9,
    PitchForwardSlow = 10,
    PitchBackFast = 11,
    PitchBackSlow = 12,
    RollLeftFast = 13,
    RollLeftSlow = 14,
    RollRightFast = 15,
    RollRightSlow = 16,
}

impl Stick {
    /// Every stick variant, in tag order.
    pub const ALL: [Stick; 17] = [
        Stick::Hover,
        Stick::AscendFast,
        Stick::AscendSlow,
        Stick::DescendFast,
        Stick::DescendSlow,
        Stick::YawCcwFast,
        Stick::YawCcwSlow,
        Stick::YawCwFast,
        Stick::YawCwSlow,
        Stick::PitchForwardFast,
        Stick::PitchForwardSlow,
        Stick::PitchBackFast,
        Stick::PitchBackSlow,
        Stick::RollLeftFast,
        Stick::RollLeftSlow,
        Stick::RollRightFast,
        Stick::RollRightSlow,
    ];

    /// Recover a variant from its tag.
    pub fn from_u8(tag: u8) -> Option<Self> {
        Self::ALL.get(usize::from(tag)).copied()
    }

    /// Tag for atomic storage.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Header and axis bytes, without timestamp and checksum.
    pub fn template(self) -> &'static Template {
        match self {
            Self::Hover => &HOVER,
            Self::AscendFast => &ASCEND_FAST,
            Self::AscendSlow => &ASCEND_SLOW,
            Self::DescendFast => &DESCEND_FAST,
            Self::DescendSlow => &DESCEND_SLOW,
            Self::YawCcwFast => &YAW_CCW_FAST,
            Self::YawCcwSlow => &YAW_CCW_SLOW,
            Self::YawCwFast => &YAW_CW_FAST,
            Self::YawCwSlow => &YAW_CW_SLOW,
            Self::PitchForwardFast => &PITCH_FORWARD_FAST,
            Self::PitchForwardSlow => &PITCH_FORWARD_SLOW,
            Self::PitchBackFast => &PITCH_BACK_FAST,
            Self::PitchBackSlow => &PITCH_BACK_SLOW,
            Self::RollLeftFast => &ROLL_LEFT_FAST,
            Self::RollLeftSlow => &ROLL_LEFT_SLOW,
            Self::RollRightFast => &ROLL_RIGHT_FAST,
            Self::RollRightSlow => &ROLL_RIGHT_SLOW,
        }
    }

    /// Identify which variant a stick packet (or template) was built from.
    pub fn from_template(bytes: &[u8]) -> Option<Self> {
        let head = bytes.get(..STICK_TEMPLATE_LEN)?;
        Self::ALL.into_iter().find(|s| s.template()[..] == *head)
    }
}

impl TryFrom<u8> for Stick {
    type Error = ProtocolError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Self::from_u8(tag).ok_or(ProtocolError::UnknownStick(tag))
    }
}

impl fmt::Display for Stick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hover => "hover",
            Self::AscendFast => "ascend-fast",
            Self::AscendSlow => "ascend-slow",
            Self::DescendFast => "descend-fast",
            Self::DescendSlow => "descend-slow",
            Self::YawCcwFast => "yaw-ccw-fast",
            Self::YawCcwSlow => "yaw-ccw-slow",
            Self::YawCwFast => "yaw-cw-fast",
            Self::YawCwSlow => "yaw-cw-slow",
            Self::PitchForwardFast => "pitch-forward-fast",
            Self::PitchForwardSlow => "pitch-forward-slow",
            Self::PitchBackFast => "pitch-back-fast",
            Self::PitchBackSlow => "pitch-back-slow",
            Self::RollLeftFast => "roll-left-fast",
            Self::RollLeftSlow => "roll-left-slow",
            Self::RollRightFast => "roll-right-fast",
            Self::RollRightSlow => "roll-right-slow",
        };
        f.write_str(name)
    }
}
