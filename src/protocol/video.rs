//! H.264 datagram inspection and the keyframe gate.
//!
//! Each video datagram starts with a two byte sequence prefix followed by a raw
//! Annex-B fragment. A fragment that begins a NAL unit has the 4-byte start
//! code right after the prefix.

use std::fmt;

/// Bytes dropped from the front of every datagram before relaying.
pub const VIDEO_PREFIX_LEN: usize = 2;

/// Annex-B start code.
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

const NAL_HEADER_OFFSET: usize = VIDEO_PREFIX_LEN + START_CODE.len();

/// NAL unit types this crate cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NalUnitType {
    /// Non-IDR coded slice.
    Slice,
    /// IDR coded slice.
    Idr,
    /// Supplemental enhancement information.
    Sei,
    /// Sequence parameter set; the decoder entry point.
    Sps,
    /// Picture parameter set.
    Pps,
    /// Access unit delimiter.
    AccessUnitDelimiter,
    Other(u8),
}

impl NalUnitType {
    /// Classify from the low five bits of a NAL header byte.
    pub fn from_header(byte: u8) -> Self {
        match byte & 0x1f {
            1 => Self::Slice,
            5 => Self::Idr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::AccessUnitDelimiter,
            other => Self::Other(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Slice => 1,
            Self::Idr => 5,
            Self::Sei => 6,
            Self::Sps => 7,
            Self::Pps => 8,
            Self::AccessUnitDelimiter => 9,
            Self::Other(v) => v,
        }
    }
}

impl fmt::Display for NalUnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Slice => write!(f, "slice"),
            Self::Idr => write!(f, "idr"),
            Self::Sei => write!(f, "sei"),
            Self::Sps => write!(f, "sps"),
            Self::Pps => write!(f, "pps"),
            Self::AccessUnitDelimiter => write!(f, "aud"),
            Self::Other(v) => write!(f, "nal({v})"),
        }
    }
}

/// NAL type of a datagram that opens a unit, `None` for continuation fragments.
pub fn leading_nal(datagram: &[u8]) -> Option<NalUnitType> {
    if datagram.len() <= NAL_HEADER_OFFSET {
        return None;
    }
    if datagram[VIDEO_PREFIX_LEN..NAL_HEADER_OFFSET] != START_CODE {
        return None;
    }
    Some(NalUnitType::from_header(datagram[NAL_HEADER_OFFSET]))
}

/// Outcome of offering one datagram to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision<'a> {
    /// Still waiting for the first SPS.
    Drop,
    /// Relay these bytes.
    Forward(&'a [u8]),
}

/// Holds the stream back until the first sequence parameter set.
///
/// Once opened the gate stays open for its lifetime.
#[derive(Debug, Default)]
pub struct KeyframeGate {
    keyframe_seen: bool,
}

impl KeyframeGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.keyframe_seen
    }

    /// Inspect a datagram and decide whether to relay it.
    pub fn admit<'a>(&mut self, datagram: &'a [u8]) -> GateDecision<'a> {
        if leading_nal(datagram) == Some(NalUnitType::Sps) {
            self.keyframe_seen = true;
        }

        if self.keyframe_seen {
            GateDecision::Forward(datagram.get(VIDEO_PREFIX_LEN..).unwrap_or(&[]))
        } else {
            GateDecision::Drop
        }
    }
}
