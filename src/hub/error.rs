//! Hub error types

use thiserror::Error;

use super::subscriber::ConnectionId;
use crate::error::ProtocolError;

/// Error type for hub operations
#[derive(Debug, Error)]
pub enum HubError {
    /// Connection is not registered (never connected, or already dropped)
    #[error("connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    /// Channel name or envelope failed validation
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Connection reached its subscription limit
    #[error("connection {conn_id} reached subscription limit of {limit}")]
    SubscriptionLimit { conn_id: ConnectionId, limit: usize },

    /// Message could not be serialized for fan-out
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}
