//! Domain error types.

use thiserror::Error;

use super::ConnectionId;

/// Value object validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("room id '{0}' must be 8 characters of A-Z or 0-9")]
    MalformedRoomId(String),
}

/// Failures reported by a persistence gateway
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage query failed: {0}")]
    Query(String),

    #[error("stored record is invalid: {0}")]
    InvalidRecord(String),
}

/// Failures handing a frame to a connection's outbound channel
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("connection {0} is no longer receiving")]
    Closed(ConnectionId),
}
