//! Records and in-memory views of rooms, devices, and connections.

use tokio::sync::mpsc;

use super::{
    ConnectionId, ConnectionRecordId, DeviceId, Identity, MessagePushError, RoomId, Timestamp,
};

/// Outbound channel of one connection; drained into its WebSocket by a pusher task.
pub type PusherChannel = mpsc::UnboundedSender<String>;

/// Persisted room. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRecord {
    pub room_id: RoomId,
    pub created_at: Timestamp,
}

/// Persisted device identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub device_id: DeviceId,
    pub last_room_id: RoomId,
    pub last_identity: Identity,
    pub first_connected_at: Timestamp,
    pub last_connected_at: Timestamp,
}

/// Persisted connection audit row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRecord {
    pub id: ConnectionRecordId,
    pub device_id: DeviceId,
    pub room_id: RoomId,
    pub identity: Identity,
    pub client_address: String,
    pub connected_at: Timestamp,
    pub disconnected_at: Option<Timestamp>,
}

/// One relayed frame as seen by one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub from_device_id: DeviceId,
    pub to_device_id: DeviceId,
    pub room_id: RoomId,
    pub payload: String,
    pub sent_at: Timestamp,
}

/// Audit row for a room introspection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomQueryRecord {
    pub device_id: DeviceId,
    pub room_id: RoomId,
    pub queried_at: Timestamp,
}

/// A live connection as referenced by the room registry.
#[derive(Debug, Clone)]
pub struct Member {
    pub connection_id: ConnectionId,
    pub device_id: DeviceId,
    pub identity: Identity,
    sender: PusherChannel,
}

impl Member {
    pub fn new(
        connection_id: ConnectionId,
        device_id: DeviceId,
        identity: Identity,
        sender: PusherChannel,
    ) -> Self {
        Self {
            connection_id,
            device_id,
            identity,
            sender,
        }
    }

    /// Hand a frame to this member's outbound channel without waiting on the socket.
    pub fn push(&self, frame: &str) -> Result<(), MessagePushError> {
        self.sender
            .send(frame.to_string())
            .map_err(|_| MessagePushError::Closed(self.connection_id))
    }

    pub fn peer(&self) -> Peer {
        Peer {
            device_id: self.device_id.clone(),
            identity: self.identity.clone(),
        }
    }
}

/// Public view of a room member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub device_id: DeviceId,
    pub identity: Identity,
}

/// Consistent view of a room taken under a single registry lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomView {
    pub room_id: RoomId,
    /// Member count, including the connection the view was taken for.
    pub total_members: usize,
    /// Members other than the excluded connection.
    pub peers: Vec<Peer>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: u64, sender: PusherChannel) -> Member {
        Member::new(
            ConnectionId::new(id),
            DeviceId::try_from(format!("device-{}", id)).unwrap(),
            Identity::try_from(format!("user-{}", id)).unwrap(),
            sender,
        )
    }

    #[tokio::test]
    async fn test_member_push_delivers_frame() {
        // テスト項目: Member::push でフレームが送信チャンネルに渡される
        // given (前提条件):
        let (tx, mut rx) = mpsc::unbounded_channel();
        let member = member(1, tx);

        // when (操作):
        let result = member.push("{\"type\":\"chat\"}");

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(rx.recv().await, Some("{\"type\":\"chat\"}".to_string()));
    }

    #[test]
    fn test_member_push_fails_when_receiver_dropped() {
        // テスト項目: 受信側が閉じている場合は Closed エラーになる
        // given (前提条件):
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let member = member(7, tx);

        // when (操作):
        let result = member.push("hello");

        // then (期待する結果):
        assert_eq!(result, Err(MessagePushError::Closed(ConnectionId::new(7))));
    }
}
