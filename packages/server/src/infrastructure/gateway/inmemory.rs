//! InMemory persistence gateway.
//!
//! Keeps every record in process memory. Nothing survives a restart, so this
//! is meant for tests and for running the relay without a database file.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use roomrelay_shared::time::{Clock, SystemClock};
use tokio::sync::Mutex;

use crate::domain::{
    ConnectionRecord, ConnectionRecordId, DeviceId, DeviceRecord, GatewayError, Identity,
    MessageRecord, PersistenceGateway, RoomId, RoomQueryRecord, RoomRecord, Timestamp,
};

#[derive(Debug, Default)]
struct Store {
    rooms: HashMap<RoomId, RoomRecord>,
    devices: HashMap<DeviceId, DeviceRecord>,
    connections: Vec<ConnectionRecord>,
    messages: Vec<MessageRecord>,
    room_queries: Vec<RoomQueryRecord>,
}

/// In-memory gateway with switchable unavailability.
pub struct InMemoryGateway {
    store: Mutex<Store>,
    clock: Arc<dyn Clock>,
    /// When set, every operation fails with [`GatewayError::Unavailable`]
    unavailable: AtomicBool,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Mutex::new(Store::default()),
            clock,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every following operation fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), GatewayError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(GatewayError::Unavailable("in-memory store switched off".to_string()))
        } else {
            Ok(())
        }
    }

    fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }

    pub async fn rooms(&self) -> Vec<RoomRecord> {
        self.store.lock().await.rooms.values().cloned().collect()
    }

    pub async fn device(&self, device_id: &DeviceId) -> Option<DeviceRecord> {
        self.store.lock().await.devices.get(device_id).cloned()
    }

    pub async fn connections(&self) -> Vec<ConnectionRecord> {
        self.store.lock().await.connections.clone()
    }

    pub async fn messages(&self) -> Vec<MessageRecord> {
        self.store.lock().await.messages.clone()
    }

    pub async fn room_queries(&self) -> Vec<RoomQueryRecord> {
        self.store.lock().await.room_queries.clone()
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryGateway {
    async fn room_exists(&self, room_id: &RoomId) -> Result<bool, GatewayError> {
        self.check_available()?;
        Ok(self.store.lock().await.rooms.contains_key(room_id))
    }

    async fn create_room(&self, room_id: &RoomId) -> Result<(), GatewayError> {
        self.check_available()?;
        let mut store = self.store.lock().await;
        if store.rooms.contains_key(room_id) {
            return Err(GatewayError::Query(format!("room {} already exists", room_id)));
        }
        let record = RoomRecord {
            room_id: room_id.clone(),
            created_at: self.now(),
        };
        store.rooms.insert(room_id.clone(), record);
        Ok(())
    }

    async fn device_last_room(
        &self,
        device_id: &DeviceId,
    ) -> Result<Option<RoomId>, GatewayError> {
        self.check_available()?;
        let store = self.store.lock().await;
        Ok(store
            .devices
            .get(device_id)
            .map(|device| device.last_room_id.clone()))
    }

    async fn upsert_device(
        &self,
        device_id: &DeviceId,
        room_id: &RoomId,
        identity: &Identity,
    ) -> Result<bool, GatewayError> {
        self.check_available()?;
        let now = self.now();
        let mut store = self.store.lock().await;
        match store.devices.get_mut(device_id) {
            Some(device) => {
                device.last_room_id = room_id.clone();
                device.last_identity = identity.clone();
                device.last_connected_at = now;
                Ok(false)
            }
            None => {
                let record = DeviceRecord {
                    device_id: device_id.clone(),
                    last_room_id: room_id.clone(),
                    last_identity: identity.clone(),
                    first_connected_at: now,
                    last_connected_at: now,
                };
                store.devices.insert(device_id.clone(), record);
                Ok(true)
            }
        }
    }

    async fn record_connection(
        &self,
        device_id: &DeviceId,
        room_id: &RoomId,
        identity: &Identity,
        client_address: &str,
    ) -> Result<ConnectionRecordId, GatewayError> {
        self.check_available()?;
        let now = self.now();
        let mut store = self.store.lock().await;
        let id = ConnectionRecordId::new(store.connections.len() as i64 + 1);
        store.connections.push(ConnectionRecord {
            id,
            device_id: device_id.clone(),
            room_id: room_id.clone(),
            identity: identity.clone(),
            client_address: client_address.to_string(),
            connected_at: now,
            disconnected_at: None,
        });
        Ok(id)
    }

    async fn record_disconnection(
        &self,
        record_id: ConnectionRecordId,
    ) -> Result<(), GatewayError> {
        self.check_available()?;
        let now = self.now();
        let mut store = self.store.lock().await;
        if let Some(record) = store
            .connections
            .iter_mut()
            .find(|record| record.id == record_id && record.disconnected_at.is_none())
        {
            record.disconnected_at = Some(now);
        }
        Ok(())
    }

    async fn record_message(
        &self,
        from_device_id: &DeviceId,
        to_device_id: &DeviceId,
        room_id: &RoomId,
        payload: &str,
    ) -> Result<(), GatewayError> {
        self.check_available()?;
        let sent_at = self.now();
        self.store.lock().await.messages.push(MessageRecord {
            from_device_id: from_device_id.clone(),
            to_device_id: to_device_id.clone(),
            room_id: room_id.clone(),
            payload: payload.to_string(),
            sent_at,
        });
        Ok(())
    }

    async fn record_room_query(
        &self,
        device_id: &DeviceId,
        room_id: &RoomId,
    ) -> Result<(), GatewayError> {
        self.check_available()?;
        let queried_at = self.now();
        self.store.lock().await.room_queries.push(RoomQueryRecord {
            device_id: device_id.clone(),
            room_id: room_id.clone(),
            queried_at,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomrelay_shared::time::FixedClock;

    fn room(id: &str) -> RoomId {
        RoomId::try_from(id.to_string()).unwrap()
    }

    fn device(id: &str) -> DeviceId {
        DeviceId::try_from(id.to_string()).unwrap()
    }

    fn identity(name: &str) -> Identity {
        Identity::try_from(name.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_create_room_then_exists() {
        // テスト項目: 作成したルームは存在確認で true になる
        // given (前提条件):
        let gateway = InMemoryGateway::with_clock(Arc::new(FixedClock::new(1000)));
        let room_id = room("ROOM0001");

        // when (操作):
        let before = gateway.room_exists(&room_id).await.unwrap();
        gateway.create_room(&room_id).await.unwrap();
        let after = gateway.room_exists(&room_id).await.unwrap();

        // then (期待する結果):
        assert!(!before);
        assert!(after);
        assert_eq!(gateway.rooms().await[0].created_at, Timestamp::new(1000));
        assert!(gateway.create_room(&room_id).await.is_err());
    }

    #[tokio::test]
    async fn test_upsert_device_reports_insert_then_update() {
        // テスト項目: 初回の upsert は挿入、2回目は更新として報告される
        // given (前提条件):
        let gateway = InMemoryGateway::new();
        let device_id = device("D1");

        // when (操作):
        let first = gateway
            .upsert_device(&device_id, &room("ROOM0001"), &identity("alice"))
            .await
            .unwrap();
        let second = gateway
            .upsert_device(&device_id, &room("ROOM0002"), &identity("alice-2"))
            .await
            .unwrap();

        // then (期待する結果):
        assert!(first);
        assert!(!second);
        let record = gateway.device(&device_id).await.unwrap();
        assert_eq!(record.last_room_id, room("ROOM0002"));
        assert_eq!(record.last_identity, identity("alice-2"));
        assert_eq!(
            gateway.device_last_room(&device_id).await.unwrap(),
            Some(room("ROOM0002"))
        );
        assert_eq!(gateway.device_last_room(&device("D2")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_connection_record_lifecycle() {
        // テスト項目: 接続記録が作成され、切断時刻が一度だけ記録される
        // given (前提条件):
        let gateway = InMemoryGateway::with_clock(Arc::new(FixedClock::new(5000)));
        let record_id = gateway
            .record_connection(&device("D1"), &room("ROOM0001"), &identity("alice"), "10.0.0.1")
            .await
            .unwrap();

        // when (操作):
        gateway.record_disconnection(record_id).await.unwrap();
        gateway.record_disconnection(record_id).await.unwrap();

        // then (期待する結果):
        let records = gateway.connections().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, record_id);
        assert_eq!(records[0].client_address, "10.0.0.1");
        assert_eq!(records[0].disconnected_at, Some(Timestamp::new(5000)));
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_operation() {
        // テスト項目: 利用不可に設定すると全ての操作がエラーになる
        // given (前提条件):
        let gateway = InMemoryGateway::new();
        gateway.set_unavailable(true);

        // when (操作):
        let exists = gateway.room_exists(&room("ROOM0001")).await;
        let message = gateway
            .record_message(&device("D1"), &device("D2"), &room("ROOM0001"), "{}")
            .await;

        // then (期待する結果):
        assert!(matches!(exists, Err(GatewayError::Unavailable(_))));
        assert!(matches!(message, Err(GatewayError::Unavailable(_))));

        gateway.set_unavailable(false);
        assert_eq!(gateway.room_exists(&room("ROOM0001")).await, Ok(false));
    }
}
