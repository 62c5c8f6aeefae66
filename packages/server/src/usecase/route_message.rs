//! UseCase: メッセージ中継処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - RouteMessageUseCase::relay() / query_room() メソッド
//!
//! ### なぜこのテストが必要か
//! - 送信者以外の全メンバーに、内容を変えずにフレームが届くことを保証
//! - 配送できた相手の分だけメッセージ履歴が保存されることを確認
//! - room_info の人数に送信者が含まれることを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：K 人のルームでの中継、ルーム情報の問い合わせ
//! - 異常系：配送先の切断、ストレージ障害
//! - エッジケース：送信者のみのルーム

use std::sync::Arc;

use crate::{
    domain::{ConnectionId, DeviceId, PersistenceGateway, RoomId, RoomView},
    infrastructure::registry::RoomRegistry,
};

/// The sending side of a routed frame: an Active connection bound to a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveConnection {
    pub connection_id: ConnectionId,
    pub device_id: DeviceId,
    pub room_id: RoomId,
}

/// Outcome of one relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub delivered: usize,
    pub failed: usize,
}

/// メッセージ中継のユースケース
pub struct RouteMessageUseCase {
    gateway: Arc<dyn PersistenceGateway>,
    rooms: Arc<RoomRegistry>,
}

impl RouteMessageUseCase {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, rooms: Arc<RoomRegistry>) -> Self {
        Self { gateway, rooms }
    }

    /// 送信者のルーム情報を取得し、問い合わせを記録する
    pub async fn query_room(&self, origin: &ActiveConnection) -> RoomView {
        let view = self.rooms.view(&origin.room_id, origin.connection_id).await;

        if let Err(e) = self
            .gateway
            .record_room_query(&origin.device_id, &origin.room_id)
            .await
        {
            tracing::error!(
                "Failed to record room query of device {} in room {}: {}",
                origin.device_id,
                origin.room_id,
                e
            );
        }

        tracing::debug!(
            "Device {} queried room {} ({} members)",
            origin.device_id,
            origin.room_id,
            view.total_members
        );
        view
    }

    /// フレームを送信者以外のメンバーへそのまま中継する
    ///
    /// 配送できた相手ごとにメッセージ履歴を1件保存する。
    pub async fn relay(&self, origin: &ActiveConnection, payload: &str) -> RelayReport {
        let mut delivered: Vec<DeviceId> = Vec::new();
        let mut failed = 0;

        self.rooms
            .for_each_member(&origin.room_id, origin.connection_id, |member| {
                match member.push(payload) {
                    Ok(()) => delivered.push(member.device_id.clone()),
                    Err(e) => {
                        tracing::warn!("Skipping recipient {}: {}", member.device_id, e);
                        failed += 1;
                    }
                }
            })
            .await;

        // Registry lock is released at this point.
        for to_device_id in &delivered {
            if let Err(e) = self
                .gateway
                .record_message(&origin.device_id, to_device_id, &origin.room_id, payload)
                .await
            {
                tracing::error!(
                    "Failed to record message from {} to {} in room {}: {}",
                    origin.device_id,
                    to_device_id,
                    origin.room_id,
                    e
                );
            }
        }

        tracing::debug!(
            "Relayed frame from {} in room {} to {} peers ({} failed)",
            origin.device_id,
            origin.room_id,
            delivered.len(),
            failed
        );

        RelayReport {
            delivered: delivered.len(),
            failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{Identity, Member, Peer},
        infrastructure::gateway::InMemoryGateway,
    };
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn room() -> RoomId {
        RoomId::try_from("ROOM0001".to_string()).unwrap()
    }

    fn device(id: &str) -> DeviceId {
        DeviceId::try_from(id.to_string()).unwrap()
    }

    async fn add_member(
        rooms: &RoomRegistry,
        id: u64,
        device_id: &str,
    ) -> (ActiveConnection, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let member = Member::new(
            ConnectionId::new(id),
            device(device_id),
            Identity::try_from(format!("{}-user", device_id)).unwrap(),
            tx,
        );
        rooms.join(&room(), member).await;
        let origin = ActiveConnection {
            connection_id: ConnectionId::new(id),
            device_id: device(device_id),
            room_id: room(),
        };
        (origin, rx)
    }

    fn create_usecase() -> (RouteMessageUseCase, Arc<InMemoryGateway>, Arc<RoomRegistry>) {
        let gateway = Arc::new(InMemoryGateway::new());
        let rooms = Arc::new(RoomRegistry::new());
        let usecase = RouteMessageUseCase::new(gateway.clone(), rooms.clone());
        (usecase, gateway, rooms)
    }

    #[tokio::test]
    async fn test_relay_reaches_every_other_member_unchanged() {
        // テスト項目: K 人のルームで中継すると K-1 人に同じ内容が届き、送信者には届かない
        // given (前提条件):
        let (usecase, gateway, rooms) = create_usecase();
        let (sender, mut sender_rx) = add_member(&rooms, 1, "D1").await;
        let (_, mut rx2) = add_member(&rooms, 2, "D2").await;
        let (_, mut rx3) = add_member(&rooms, 3, "D3").await;
        let payload = r#"{"type":"chat","text":"hi","nested":{"n":1}}"#;

        // when (操作):
        let report = usecase.relay(&sender, payload).await;

        // then (期待する結果):
        assert_eq!(report, RelayReport { delivered: 2, failed: 0 });
        assert_eq!(rx2.recv().await.as_deref(), Some(payload));
        assert_eq!(rx3.recv().await.as_deref(), Some(payload));
        assert!(sender_rx.try_recv().is_err());

        let messages = gateway.messages().await;
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.from_device_id == device("D1")));
        assert!(messages.iter().all(|m| m.payload == payload));
        let mut recipients: Vec<_> = messages.iter().map(|m| m.to_device_id.clone()).collect();
        recipients.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        assert_eq!(recipients, vec![device("D2"), device("D3")]);
    }

    #[tokio::test]
    async fn test_relay_skips_closed_recipient() {
        // テスト項目: 切断済みの相手はスキップされ、メッセージ履歴も保存されない
        // given (前提条件):
        let (usecase, gateway, rooms) = create_usecase();
        let (sender, _sender_rx) = add_member(&rooms, 1, "D1").await;
        let (_, closed_rx) = add_member(&rooms, 2, "D2").await;
        let (_, mut rx3) = add_member(&rooms, 3, "D3").await;
        drop(closed_rx);

        // when (操作):
        let report = usecase.relay(&sender, "{}").await;

        // then (期待する結果):
        assert_eq!(report, RelayReport { delivered: 1, failed: 1 });
        assert_eq!(rx3.recv().await.as_deref(), Some("{}"));
        let messages = gateway.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].to_device_id, device("D3"));
    }

    #[tokio::test]
    async fn test_relay_alone_in_room_delivers_nothing() {
        // テスト項目: 送信者のみのルームでは誰にも届かない
        // given (前提条件):
        let (usecase, gateway, rooms) = create_usecase();
        let (sender, _rx) = add_member(&rooms, 1, "D1").await;

        // when (操作):
        let report = usecase.relay(&sender, "{\"type\":\"ping\"}").await;

        // then (期待する結果):
        assert_eq!(report, RelayReport::default());
        assert!(gateway.messages().await.is_empty());
    }

    #[tokio::test]
    async fn test_relay_delivers_even_if_storage_fails() {
        // テスト項目: メッセージ履歴の保存に失敗しても配送は行われる
        // given (前提条件):
        let (usecase, gateway, rooms) = create_usecase();
        let (sender, _rx) = add_member(&rooms, 1, "D1").await;
        let (_, mut rx2) = add_member(&rooms, 2, "D2").await;
        gateway.set_unavailable(true);

        // when (操作):
        let report = usecase.relay(&sender, "{\"a\":1}").await;

        // then (期待する結果):
        assert_eq!(report.delivered, 1);
        assert_eq!(rx2.recv().await.as_deref(), Some("{\"a\":1}"));
    }

    #[tokio::test]
    async fn test_query_room_counts_sender_and_lists_peers() {
        // テスト項目: room_info の人数には送信者が含まれ、一覧からは除外される
        // given (前提条件):
        let (usecase, gateway, rooms) = create_usecase();
        let (sender, _rx1) = add_member(&rooms, 1, "D1").await;
        let (_, _rx2) = add_member(&rooms, 2, "D2").await;

        // when (操作):
        let view = usecase.query_room(&sender).await;

        // then (期待する結果):
        assert_eq!(view.room_id, room());
        assert_eq!(view.total_members, 2);
        assert_eq!(
            view.peers,
            vec![Peer {
                device_id: device("D2"),
                identity: Identity::try_from("D2-user".to_string()).unwrap(),
            }]
        );
        let queries = gateway.room_queries().await;
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].device_id, device("D1"));
        assert_eq!(queries[0].room_id, room());
    }

    #[tokio::test]
    async fn test_query_room_alone() {
        // テスト項目: 1人だけのルームでは total_clients が 1、一覧は空になる
        // given (前提条件):
        let (usecase, _gateway, rooms) = create_usecase();
        let (sender, _rx) = add_member(&rooms, 1, "D1").await;

        // when (操作):
        let view = usecase.query_room(&sender).await;

        // then (期待する結果):
        assert_eq!(view.total_members, 1);
        assert!(view.peers.is_empty());
    }
}
