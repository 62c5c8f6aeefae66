//! UseCase: ルーム割り当て処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - AssignRoomUseCase::execute() メソッド
//! - 指定ルームへの参加、前回ルームへの再接続、新規ルーム作成の3つの方針
//!
//! ### なぜこのテストが必要か
//! - 存在しないルームを指定した場合に何も永続化されないことを保証
//! - 並行して割り当てても同じルーム ID が二重に作成されないことを保証
//! - ストレージ障害時に縮退したルーム割り当て（status `error`）になることを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：created_new / reconnected / joined_existing
//! - 異常系：room_not_found、ストレージ障害
//! - エッジケース：生成した ID の衝突と再試行、並行割り当て

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    domain::{AssignmentStatus, DeviceId, GatewayError, Identity, PersistenceGateway, RoomId},
    infrastructure::registry::RoomRegistry,
};

/// A room the connection may join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub room_id: RoomId,
    /// Whether the device record was inserted (rather than updated) by this assignment
    pub is_new_device: bool,
    pub status: AssignmentStatus,
}

/// Result of a room assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    Placed(Placement),
    /// The explicitly requested room is not persisted. Nothing was written.
    RoomNotFound { requested: String },
}

impl Assignment {
    /// Storage failed somewhere in the assignment: hand out a fresh, unpersisted
    /// room so the connection can still proceed best-effort.
    fn degraded() -> Self {
        Self::Placed(Placement {
            room_id: RoomId::generate(),
            is_new_device: false,
            status: AssignmentStatus::Error,
        })
    }

    pub fn status(&self) -> AssignmentStatus {
        match self {
            Self::Placed(placement) => placement.status,
            Self::RoomNotFound { .. } => AssignmentStatus::RoomNotFound,
        }
    }
}

/// ルーム割り当てのユースケース
pub struct AssignRoomUseCase {
    /// PersistenceGateway（永続化の抽象化）
    gateway: Arc<dyn PersistenceGateway>,
    /// RoomRegistry（メモリ上のルームメンバー管理）
    rooms: Arc<RoomRegistry>,
    /// Serializes every assignment, storage round trips included.
    critical_section: Mutex<()>,
}

impl AssignRoomUseCase {
    /// 新しい AssignRoomUseCase を作成
    pub fn new(gateway: Arc<dyn PersistenceGateway>, rooms: Arc<RoomRegistry>) -> Self {
        Self {
            gateway,
            rooms,
            critical_section: Mutex::new(()),
        }
    }

    /// ルーム割り当てを実行
    ///
    /// # Arguments
    ///
    /// * `device_id` - 接続するデバイスの ID
    /// * `identity` - 接続ごとの表示名
    /// * `requested_room` - クライアントが指定したルーム ID（空文字列は未指定扱い）
    ///
    /// # Returns
    ///
    /// * `Assignment::Placed` - 参加するルーム（ストレージ障害時は status `error` の縮退ルーム）
    /// * `Assignment::RoomNotFound` - 指定ルームが存在しない
    pub async fn execute(
        &self,
        device_id: &DeviceId,
        identity: &Identity,
        requested_room: Option<&str>,
    ) -> Assignment {
        // Held until the registry entry exists, so no two assignments can
        // allocate the same id or initialize the same room twice.
        let _serialized = self.critical_section.lock().await;

        let resolved = match requested_room.filter(|room| !room.is_empty()) {
            Some(requested) => self.join_requested(device_id, identity, requested).await,
            None => self.resolve_for_device(device_id, identity).await,
        };

        let assignment = resolved.unwrap_or_else(|e| {
            tracing::error!(
                "Storage failed while assigning a room to device {}: {}",
                device_id,
                e
            );
            Assignment::degraded()
        });

        match &assignment {
            Assignment::Placed(placement) => {
                self.rooms.ensure_room(&placement.room_id).await;
                tracing::info!(
                    "Device {} assigned to room {} ({}, new device: {})",
                    device_id,
                    placement.room_id,
                    placement.status,
                    placement.is_new_device
                );
            }
            Assignment::RoomNotFound { requested } => {
                tracing::warn!(
                    "Device {} requested room {} which does not exist",
                    device_id,
                    requested
                );
            }
        }

        assignment
    }

    async fn join_requested(
        &self,
        device_id: &DeviceId,
        identity: &Identity,
        requested: &str,
    ) -> Result<Assignment, GatewayError> {
        // Ids outside the alphabet can never have been persisted.
        let Ok(room_id) = RoomId::try_from(requested.to_string()) else {
            return Ok(Assignment::RoomNotFound {
                requested: requested.to_string(),
            });
        };

        if !self.gateway.room_exists(&room_id).await? {
            return Ok(Assignment::RoomNotFound {
                requested: requested.to_string(),
            });
        }

        let is_new_device = self
            .gateway
            .upsert_device(device_id, &room_id, identity)
            .await?;

        Ok(Assignment::Placed(Placement {
            room_id,
            is_new_device,
            status: AssignmentStatus::JoinedExisting,
        }))
    }

    async fn resolve_for_device(
        &self,
        device_id: &DeviceId,
        identity: &Identity,
    ) -> Result<Assignment, GatewayError> {
        if let Some(room_id) = self.gateway.device_last_room(device_id).await? {
            // Refreshes last_connected_at and last_identity.
            self.gateway
                .upsert_device(device_id, &room_id, identity)
                .await?;
            return Ok(Assignment::Placed(Placement {
                room_id,
                is_new_device: false,
                status: AssignmentStatus::Reconnected,
            }));
        }

        let room_id = self.allocate_room_id().await?;
        self.gateway.create_room(&room_id).await?;
        let is_new_device = self
            .gateway
            .upsert_device(device_id, &room_id, identity)
            .await?;

        Ok(Assignment::Placed(Placement {
            room_id,
            is_new_device,
            status: AssignmentStatus::CreatedNew,
        }))
    }

    /// Sample ids until storage confirms one is unused. No retry limit: with
    /// 36^8 ids a long streak of collisions does not happen in practice.
    async fn allocate_room_id(&self) -> Result<RoomId, GatewayError> {
        loop {
            let candidate = RoomId::generate();
            if !self.gateway.room_exists(&candidate).await? {
                return Ok(candidate);
            }
            tracing::debug!("Generated room id {} is taken, retrying", candidate);
        }
    }
}
