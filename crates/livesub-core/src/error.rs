//! Core error types.

use thiserror::Error;

/// Broker errors.
///
/// None of these ever reach the write path that produced a change; the
/// translator reports problems through logs and its dispatch report instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] livesub_proto::Error),

    /// A record could not be built from the supplied data.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// The session limit has been reached.
    #[error("too many sessions (max: {0})")]
    TooManySessions(usize),

    /// The CDC queue is full.
    #[error("change queue is full")]
    QueueFull,

    /// The CDC processor has stopped.
    #[error("change queue is closed")]
    QueueClosed,
}

/// Result alias for broker operations.
pub type Result<T> = std::result::Result<T, Error>;
