//! Stick packet assembly.

use chrono::{Local, NaiveTime, Timelike};

use super::checksum::checksum;
use super::command::Stick;
use super::{LEN_LONG, STICK_CHECKSUM_OFFSET, STICK_TEMPLATE_LEN};

/// Wall-clock stamp carried by each stick packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// Milliseconds, rounded; may read 1000 right before a second rolls over.
    pub millis: u16,
}

impl Timestamp {
    /// Size of the encoded field.
    pub const LEN: usize = 5;

    /// Local time now.
    pub fn now() -> Self {
        Self::from_time(Local::now().time())
    }

    /// Build from a time of day.
    pub fn from_time(time: NaiveTime) -> Self {
        // Leap-second nanos run past 1e9; clamp them back into the second.
        let micros = (time.nanosecond() % 1_000_000_000) / 1_000;
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
            second: time.second() as u8,
            millis: ((micros + 500) / 1_000) as u16,
        }
    }

    /// Hour, minute, second, millis low, millis high.
    pub fn to_bytes(self) -> [u8; Self::LEN] {
        let [lo, hi] = self.millis.to_le_bytes();
        [self.hour, self.minute, self.second, lo, hi]
    }
}

/// Complete a stick template with `stamp` and its checksum.
pub fn encode_stick(stick: Stick, stamp: Timestamp) -> [u8; LEN_LONG] {
    let mut packet = [0u8; LEN_LONG];
    packet[..STICK_TEMPLATE_LEN].copy_from_slice(stick.template());
    packet[STICK_TEMPLATE_LEN..STICK_CHECKSUM_OFFSET].copy_from_slice(&stamp.to_bytes());
    let crc = checksum(&packet[..STICK_CHECKSUM_OFFSET]);
    packet[STICK_CHECKSUM_OFFSET..].copy_from_slice(&crc.to_le_bytes());
    packet
}

/// Encode `stick` stamped with the current local time.
pub fn encode_stick_now(stick: Stick) -> [u8; LEN_LONG] {
    encode_stick(stick, Timestamp::now())
}
