//! UseCase: ルーム一覧取得処理

use std::sync::Arc;

use crate::infrastructure::registry::{ConnectionRegistry, RoomOverview, RoomRegistry};

/// Live counts for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayStatus {
    pub open_connections: usize,
    pub rooms: Vec<RoomOverview>,
}

/// ルーム一覧取得のユースケース
pub struct GetRoomsUseCase {
    rooms: Arc<RoomRegistry>,
    connections: Arc<ConnectionRegistry>,
}

impl GetRoomsUseCase {
    pub fn new(rooms: Arc<RoomRegistry>, connections: Arc<ConnectionRegistry>) -> Self {
        Self { rooms, connections }
    }

    /// 全ルームのメンバー構成を取得（ルーム ID 順）
    pub async fn execute(&self) -> Vec<RoomOverview> {
        self.rooms.overviews().await
    }

    pub async fn status(&self) -> RelayStatus {
        RelayStatus {
            open_connections: self.connections.count().await,
            rooms: self.rooms.overviews().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DeviceId, Identity, Member, RoomId};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_status_reports_connections_and_rooms() {
        // テスト項目: 接続数とルームごとのメンバーが取得できる
        // given (前提条件):
        let rooms = Arc::new(RoomRegistry::new());
        let connections = Arc::new(ConnectionRegistry::new());
        let usecase = GetRoomsUseCase::new(rooms.clone(), connections.clone());
        let id = connections.register("127.0.0.1").await;
        connections.register("127.0.0.2").await;
        let room_id = RoomId::try_from("ROOM0001".to_string()).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        rooms
            .join(
                &room_id,
                Member::new(
                    id,
                    DeviceId::try_from("D1".to_string()).unwrap(),
                    Identity::try_from("alice".to_string()).unwrap(),
                    tx,
                ),
            )
            .await;
        rooms
            .ensure_room(&RoomId::try_from("ROOM0002".to_string()).unwrap())
            .await;

        // when (操作):
        let status = usecase.status().await;

        // then (期待する結果):
        assert_eq!(status.open_connections, 2);
        assert_eq!(status.rooms.len(), 2);
        assert_eq!(status.rooms[0].room_id, room_id);
        assert_eq!(status.rooms[0].describe_members(), "1(D1:alice)");
        assert!(status.rooms[1].members.is_empty());
        assert_eq!(usecase.execute().await, status.rooms);
    }
}
