//! Error types
//!
//! Every failure in the crate maps onto one of four recovery classes:
//! transport failures are retried by reconnecting, protocol failures are
//! logged and dropped, playback failures are reported upstream and skipped,
//! and persistence failures degrade to an empty log.

use thiserror::Error;

use crate::hub::HubError;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Connection-level failure (socket closed, not connected)
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Malformed or unexpected message
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Media element failed to load or play
    #[error("playback error: {0}")]
    Playback(#[from] PlaybackError),

    /// Storage read/write failure
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Hub routing failure
    #[error("hub error: {0}")]
    Hub(#[from] HubError),

    /// No event log entry with this id
    #[error("unknown event log entry: {0}")]
    UnknownEntry(String),

    /// Socket-level I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding failure outside the wire envelope
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type
pub type Result<T> = std::result::Result<T, Error>;

/// Connection lifecycle failures
#[derive(Debug, Error)]
pub enum TransportError {
    /// No live connection to send on
    #[error("not connected")]
    NotConnected,

    /// Outbound queue is full
    #[error("outbound queue full")]
    QueueFull,

    /// Connection attempt failed
    #[error("connect to {url} failed: {reason}")]
    ConnectFailed { url: String, reason: String },

    /// WebSocket handshake did not complete in time
    #[error("handshake timed out")]
    HandshakeTimeout,

    /// Underlying WebSocket failure
    #[error("websocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Malformed or unexpected messages
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame is not valid JSON or does not match the envelope
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Channel name fails validation
    #[error("invalid channel {channel:?}: {reason}")]
    InvalidChannel {
        channel: String,
        reason: &'static str,
    },

    /// Frame exceeds the configured size limit
    #[error("frame of {size} bytes exceeds limit of {limit}")]
    FrameTooLarge { size: usize, limit: usize },

    /// Binary frames are not part of the protocol
    #[error("unexpected {0} frame")]
    UnexpectedFrame(&'static str),
}

/// Media element failures
#[derive(Debug, Clone, Error)]
pub enum PlaybackError {
    /// Source could not be loaded
    #[error("failed to load {src}: {reason}")]
    LoadFailed { src: String, reason: String },

    /// Element refused to start playing
    #[error("play rejected: {0}")]
    PlayRejected(String),

    /// Embedded player reported an error
    #[error("player error: {0}")]
    Player(String),
}

impl PlaybackError {
    /// Short reason string sent upstream in an `error` command
    pub fn reason(&self) -> String {
        match self {
            PlaybackError::LoadFailed { reason, .. } => reason.clone(),
            PlaybackError::PlayRejected(reason) | PlaybackError::Player(reason) => reason.clone(),
        }
    }
}

/// Storage failures
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Backing file could not be read or written
    #[error("storage I/O: {0}")]
    Io(#[from] std::io::Error),

    /// Stored value could not be encoded or decoded
    #[error("storage encoding: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Backend refused the write (quota, read-only)
    #[error("storage backend: {0}")]
    Backend(String),
}
