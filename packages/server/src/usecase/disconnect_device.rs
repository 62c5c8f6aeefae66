//! UseCase: デバイス切断処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - DisconnectDeviceUseCase::execute() メソッド
//! - 接続レコードの切断時刻記録、ルームからの退出、接続の登録解除
//!
//! ### なぜこのテストが必要か
//! - どの経路で接続が終了しても後始末が完了することを保証
//! - 二重に実行しても状態が壊れない（冪等である）ことを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：ルーム参加済みの接続の切断
//! - エッジケース：ハンドシェイク前の切断、二重実行、ストレージ障害

use std::sync::Arc;

use roomrelay_shared::time::timestamp_to_rfc3339;

use crate::{
    domain::{ConnectionId, ConnectionRecordId, PersistenceGateway, RoomId},
    infrastructure::registry::{ConnectionRegistry, RoomRegistry},
};

/// Everything a closed connection has to unwind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teardown {
    pub connection_id: ConnectionId,
    /// Room the connection joined, if the handshake got that far
    pub room_id: Option<RoomId>,
    /// Persisted connection record, if one was written
    pub record_id: Option<ConnectionRecordId>,
}

impl Teardown {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            room_id: None,
            record_id: None,
        }
    }
}

/// デバイス切断のユースケース
pub struct DisconnectDeviceUseCase {
    gateway: Arc<dyn PersistenceGateway>,
    rooms: Arc<RoomRegistry>,
    connections: Arc<ConnectionRegistry>,
}

impl DisconnectDeviceUseCase {
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        rooms: Arc<RoomRegistry>,
        connections: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            gateway,
            rooms,
            connections,
        }
    }

    /// 切断処理を実行（冪等）
    pub async fn execute(&self, teardown: &Teardown) {
        let connection_id = teardown.connection_id;

        if let Some(record_id) = teardown.record_id
            && let Err(e) = self.gateway.record_disconnection(record_id).await
        {
            tracing::error!(
                "Failed to record disconnection of connection {} (record {}): {}",
                connection_id,
                record_id,
                e
            );
        }

        if let Some(room_id) = &teardown.room_id
            && self.rooms.leave(room_id, connection_id).await
        {
            let overview = self.rooms.overview(room_id).await;
            if overview.members.is_empty() {
                tracing::info!("Connection {} left room {}; room is empty", connection_id, room_id);
            } else {
                tracing::info!(
                    "Connection {} left room {}; remaining: {}",
                    connection_id,
                    room_id,
                    overview.describe_members()
                );
            }
        }

        if let Some(entry) = self.connections.unregister(connection_id).await {
            tracing::info!(
                "Connection {} from {} (opened {}) closed, {} open",
                connection_id,
                entry.client_address,
                timestamp_to_rfc3339(entry.connected_at.value()),
                self.connections.count().await
            );
        }
    }
}
