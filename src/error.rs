//! Error types for the device, protocol, and leaderboard layers.
//!
//! Nothing below the supervisor recovers from a [`BoardError`]; every
//! variant propagates up to the run loop, which logs it and retries.

use crate::DeviceIdentity;
use thiserror::Error;

/// Everything that can go wrong while talking to the sign.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BoardError {
    /// No USB device with the expected vendor/product ID is attached.
    #[error("readerboard {0} not found")]
    DeviceNotFound(DeviceIdentity),

    /// The device was found but could not be opened, configured, or claimed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A control transfer failed (timeout, stall, device unplugged).
    #[error("transfer error: {0}")]
    Transfer(String),

    /// A buffer index other than 0 or 1 was requested. This is a caller bug.
    #[error("invalid buffer index {0} (expected 0 or 1)")]
    InvalidBuffer(u16),
}

pub type Result<T> = std::result::Result<T, BoardError>;

/// Errors from reading or parsing a leaderboard file.
#[derive(Debug, Error)]
pub enum LeaderboardError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: expected `initials,score`")]
    MissingField { line: usize },

    #[error("line {line}: score `{value}` is not an integer")]
    InvalidScore { line: usize, value: String },
}
