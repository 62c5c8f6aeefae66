//! Domain layer: value objects, records, and the ports the core depends on.

pub mod entity;
pub mod error;
pub mod gateway;
pub mod value_object;

pub use entity::{
    ConnectionRecord, DeviceRecord, Member, MessageRecord, Peer, PusherChannel, RoomQueryRecord,
    RoomRecord, RoomView,
};
pub use error::{GatewayError, MessagePushError, ValueError};
pub use gateway::PersistenceGateway;
pub use value_object::{
    AssignmentStatus, ConnectionId, ConnectionRecordId, DeviceId, Identity, ROOM_ID_ALPHABET,
    ROOM_ID_LENGTH, RoomId, Timestamp,
};

#[cfg(test)]
pub use gateway::MockPersistenceGateway;
