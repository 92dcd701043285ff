//! Error types for tello-link.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Result type alias for tello-link operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tello-link.
#[derive(Error, Debug)]
pub enum Error {
    // Transport errors
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    // Protocol errors
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Actor errors
    #[error("task failed: {0}")]
    TaskFailed(String),
}

/// Socket-level failures on the command or video channels.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("bind failed on {addr}: {reason}")]
    BindFailed { addr: SocketAddr, reason: String },

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    #[error("socket error: {0}")]
    SocketError(String),

    #[error("command socket closed")]
    Closed,

    #[error("datagram too large: {size} bytes (max {max})")]
    DatagramTooLarge { size: usize, max: usize },
}

/// Command packet encoding errors.
///
/// The catalog is fixed data, so any of these in a running system points at a
/// programming error rather than a condition to recover from.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid packet length: expected {expected}, got {got}")]
    InvalidLength { expected: String, got: usize },

    #[error("size field mismatch: header declares {declared}, packet has {actual}")]
    SizeFieldMismatch { declared: usize, actual: usize },

    #[error("checksum mismatch: expected {expected:#06x}, got {got:#06x}")]
    ChecksumMismatch { expected: u16, got: u16 },

    #[error("unknown stick command tag: {0}")]
    UnknownStick(u8),
}

impl Error {
    /// Check if the error is transient and the caller may simply carry on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Transport(TransportError::SendFailed(_) | TransportError::ReceiveFailed(_))
                | Error::Io(_)
        )
    }

    /// Check if the error means the command socket is gone for good.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Transport(TransportError::Closed))
    }
}
