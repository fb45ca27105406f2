//! Error taxonomy for a search session.
//!
//! Cancellation is deliberately absent: a cancelled session is a terminal
//! state, not a failure, and is never surfaced to the caller as an error.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SearchError {
    /// Rejected before any session is created.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// One frame could not be decoded. Logged and skipped; the session continues.
    #[error("frame decode error: {0}")]
    FrameDecode(String),

    /// The connection failed to open or broke mid-stream.
    #[error("transport error: {0}")]
    Transport(String),

    /// The stream was well-formed at the transport level but violated the
    /// event protocol (e.g. it ended before the results frame).
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl SearchError {
    /// Whether this error moves a running session to `Failed`.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SearchError::Transport(_) | SearchError::Protocol(_))
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
