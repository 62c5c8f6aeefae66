//! Persistence gateway trait.
//!
//! The core depends on this port only; storage adapters live in the
//! infrastructure layer.

use async_trait::async_trait;

use super::{ConnectionRecordId, DeviceId, GatewayError, Identity, RoomId};

/// Durable store for rooms, devices, connection records, messages, and room queries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Whether a room with this id has been persisted
    async fn room_exists(&self, room_id: &RoomId) -> Result<bool, GatewayError>;

    /// Persist a new room
    async fn create_room(&self, room_id: &RoomId) -> Result<(), GatewayError>;

    /// Last room the device was assigned to, if any
    async fn device_last_room(&self, device_id: &DeviceId)
    -> Result<Option<RoomId>, GatewayError>;

    /// Create or refresh the device record; returns `true` when it was inserted
    async fn upsert_device(
        &self,
        device_id: &DeviceId,
        room_id: &RoomId,
        identity: &Identity,
    ) -> Result<bool, GatewayError>;

    /// Open a connection audit row
    async fn record_connection(
        &self,
        device_id: &DeviceId,
        room_id: &RoomId,
        identity: &Identity,
        client_address: &str,
    ) -> Result<ConnectionRecordId, GatewayError>;

    /// Stamp the disconnect time on a connection audit row
    async fn record_disconnection(&self, record_id: ConnectionRecordId)
    -> Result<(), GatewayError>;

    /// Store one relayed frame for one recipient
    async fn record_message(
        &self,
        from_device_id: &DeviceId,
        to_device_id: &DeviceId,
        room_id: &RoomId,
        payload: &str,
    ) -> Result<(), GatewayError>;

    /// Store a room introspection request
    async fn record_room_query(
        &self,
        device_id: &DeviceId,
        room_id: &RoomId,
    ) -> Result<(), GatewayError>;
}
