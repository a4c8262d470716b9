//! Domain layer error definitions.

use thiserror::Error;

/// Errors surfaced by hub producers.
///
/// Peer failures and slow subscribers are handled inside the hub and never
/// reach producers; only encoding failures do.
#[derive(Debug, Error)]
pub enum HubError {
    /// The value given to `broadcast_json` could not be encoded
    #[error("failed to encode broadcast payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors related to dashboard producer input
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DashboardError {
    /// Status patch was not a JSON object
    #[error("status update must be a JSON object")]
    StatusNotObject,

    /// Log message validation error
    #[error("log message cannot be empty")]
    LogMessageEmpty,

    /// Log level not recognised
    #[error("unknown log level: {0}")]
    UnknownLogLevel(String),

    /// Conversation text validation error
    #[error("conversation text cannot be empty")]
    ConversationTextEmpty,

    /// Camera frame validation error
    #[error("camera frame cannot be empty")]
    CameraFrameEmpty,
}

/// Why a subscriber's connection was torn down.
///
/// Handled inside the subscriber; only logged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeerError {
    /// No Pong arrived within the read deadline
    #[error("no pong within {0:?}")]
    ReadTimeout(std::time::Duration),

    /// A frame could not be written within the write deadline
    #[error("write did not complete within {0:?}")]
    WriteTimeout(std::time::Duration),

    /// Inbound frame larger than the read limit
    #[error("inbound frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    /// Underlying socket read or write failed
    #[error("socket error: {0}")]
    Socket(String),
}
