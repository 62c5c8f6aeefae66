//! WebSocket frame DTOs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::AssignmentStatus;

/// Greeting sent as soon as the transport is up.
pub const CONNECTED_MESSAGE: &str = "Connected successfully";

/// Value of `type` that asks for the caller's room membership.
pub const QUERY_ROOM_TYPE: &str = "query_room";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Connection,
    Error,
    Room,
    RoomInfo,
}

/// Server → client on connect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionMessage {
    pub r#type: MessageType,
    pub message: String,
}

impl ConnectionMessage {
    pub fn connected() -> Self {
        Self {
            r#type: MessageType::Connection,
            message: CONNECTED_MESSAGE.to_string(),
        }
    }
}

/// Server → client protocol or policy error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub r#type: MessageType,
    pub message: String,
}

impl ErrorMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            r#type: MessageType::Error,
            message: message.into(),
        }
    }
}

/// Server → client after room assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomAssignedMessage {
    pub r#type: MessageType,
    pub room_id: String,
    pub status: AssignmentStatus,
    pub message: String,
}

impl RoomAssignedMessage {
    pub fn new(room_id: impl Into<String>, status: AssignmentStatus) -> Self {
        let room_id = room_id.into();
        Self {
            r#type: MessageType::Room,
            message: format!("{}: joined room {}", status, room_id),
            room_id,
            status,
        }
    }
}

/// One peer in a `room_info` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub device_id: String,
    pub identity: String,
}

/// Server → client response to `query_room`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfoMessage {
    pub r#type: MessageType,
    pub room_id: String,
    pub total_clients: usize,
    pub clients: Vec<ClientInfo>,
}

/// Client → server handshake (first frame)
///
/// Fields are optional here so that absence can be reported precisely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HandshakeRequest {
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
}

/// Any client frame after the handshake: a JSON object, inspected only for `type`.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    fields: Map<String, Value>,
}

impl InboundFrame {
    /// Parse a frame. Anything other than a JSON object is rejected.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let fields = serde_json::from_str::<Map<String, Value>>(text)?;
        Ok(Self { fields })
    }

    pub fn frame_type(&self) -> Option<&str> {
        self.fields.get("type").and_then(Value::as_str)
    }

    pub fn is_query_room(&self) -> bool {
        self.frame_type() == Some(QUERY_ROOM_TYPE)
    }
}

/// Serialize a server frame to its JSON text.
pub fn encode<T: Serialize>(frame: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(frame)
}
