//! Parsing of the identifying first frame.

use thiserror::Error;

use crate::{
    domain::{DeviceId, Identity},
    infrastructure::dto::websocket::HandshakeRequest,
};

/// Protocol errors of the handshake. `Display` is the client-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    #[error("Invalid JSON format for identity")]
    InvalidJson,
    #[error("Missing identity field")]
    MissingIdentity,
    #[error("Missing device_id field")]
    MissingDeviceId,
}

/// A validated handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub identity: Identity,
    pub device_id: DeviceId,
    /// Requested room, `None` when absent or empty
    pub room_id: Option<String>,
}

/// Validate the first frame. Identity is checked before device id.
pub fn parse_handshake(text: &str) -> Result<Handshake, HandshakeError> {
    let request: HandshakeRequest =
        serde_json::from_str(text).map_err(|_| HandshakeError::InvalidJson)?;

    let identity = request
        .identity
        .and_then(|value| Identity::try_from(value).ok())
        .ok_or(HandshakeError::MissingIdentity)?;
    let device_id = request
        .device_id
        .and_then(|value| DeviceId::try_from(value).ok())
        .ok_or(HandshakeError::MissingDeviceId)?;
    let room_id = request.room_id.filter(|room| !room.is_empty());

    Ok(Handshake {
        identity,
        device_id,
        room_id,
    })
}
