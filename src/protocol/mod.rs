//! Wire protocol for the aircraft command and video channels.
//!
//! ## Command packet format
//!
//! ```text
//! ┌──────────┬───────────────┬────────┬──────────┬─────────────┬─────────┬──────────────┐
//! │ 0xcc (1) │ len << 3 (2)  │ crc8(1)│ type (1) │ msg id (2)  │ body .. │ checksum (2) │
//! └──────────┴───────────────┴────────┴──────────┴─────────────┴─────────┴──────────────┘
//! ```
//!
//! Multi-byte fields are little-endian. Stick packets put a 5-byte wall-clock
//! stamp at the end of the body; the checksum covers everything before it.

pub mod checksum;
pub mod command;
pub mod stick;
pub mod video;

pub use checksum::{checksum, CHECKSUM_SEED};
pub use command::{connect_request, Command, Stick, CONNECT_REQUEST};
pub use stick::{encode_stick, encode_stick_now, Timestamp};
pub use video::{leading_nal, GateDecision, KeyframeGate, NalUnitType, VIDEO_PREFIX_LEN};

use crate::error::ProtocolError;

/// Short command length (connect, takeoff, keyframe request).
pub const LEN_SHORT: usize = 11;

/// Medium command length (land).
pub const LEN_MED: usize = 12;

/// Long command length (stick).
pub const LEN_LONG: usize = 22;

/// Stick template length, before timestamp and checksum.
pub const STICK_TEMPLATE_LEN: usize = 15;

/// Offset of the checksum trailer in a stick packet.
pub const STICK_CHECKSUM_OFFSET: usize = STICK_TEMPLATE_LEN + Timestamp::LEN;

/// Message id of the stick command.
pub const STICK_MESSAGE_ID: u16 = 0x50;

/// Leading byte of every framed packet.
pub const FRAME_START: u8 = 0xcc;

const _: () = assert!(STICK_CHECKSUM_OFFSET + 2 == LEN_LONG);

/// Packet length declared in the header.
pub fn declared_len(packet: &[u8]) -> Option<usize> {
    match packet {
        [FRAME_START, lo, hi, ..] => Some(usize::from(u16::from_le_bytes([*lo, *hi]) >> 3)),
        _ => None,
    }
}

/// Message id from the header.
pub fn message_id(packet: &[u8]) -> Option<u16> {
    match packet {
        [FRAME_START, _, _, _, _, lo, hi, ..] => Some(u16::from_le_bytes([*lo, *hi])),
        _ => None,
    }
}

/// Check length, declared size and checksum trailer of a framed packet.
pub fn verify(packet: &[u8]) -> Result<(), ProtocolError> {
    let len = packet.len();
    if !matches!(len, LEN_SHORT | LEN_MED | LEN_LONG) {
        return Err(ProtocolError::InvalidLength {
            expected: format!("{LEN_SHORT}, {LEN_MED} or {LEN_LONG}"),
            got: len,
        });
    }

    let declared = declared_len(packet).unwrap_or(0);
    if declared != len {
        return Err(ProtocolError::SizeFieldMismatch {
            declared,
            actual: len,
        });
    }

    let (body, trailer) = packet.split_at(len - 2);
    let expected = checksum(body);
    let got = u16::from_le_bytes([trailer[0], trailer[1]]);
    if expected != got {
        return Err(ProtocolError::ChecksumMismatch { expected, got });
    }

    Ok(())
}
