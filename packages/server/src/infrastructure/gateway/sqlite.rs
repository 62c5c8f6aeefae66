//! SQLite persistence gateway built on `sqlx`.

use std::sync::Arc;

use async_trait::async_trait;
use roomrelay_shared::time::{Clock, SystemClock};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

use crate::domain::{
    ConnectionRecordId, DeviceId, GatewayError, Identity, PersistenceGateway, RoomId,
};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Tables are created on connect when missing.
const SCHEMA: [&str; 5] = [
    "CREATE TABLE IF NOT EXISTS rooms (
        room_id TEXT PRIMARY KEY,
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS devices (
        device_id TEXT PRIMARY KEY,
        first_connected_at INTEGER NOT NULL,
        last_connected_at INTEGER NOT NULL,
        last_room_id TEXT,
        last_identity TEXT
    )",
    "CREATE TABLE IF NOT EXISTS connections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        device_id TEXT NOT NULL,
        room_id TEXT NOT NULL,
        identity TEXT NOT NULL,
        client_ip TEXT NOT NULL,
        connected_at INTEGER NOT NULL,
        disconnected_at INTEGER
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_device_id TEXT NOT NULL,
        to_device_id TEXT NOT NULL,
        room_id TEXT NOT NULL,
        message_content TEXT NOT NULL,
        sent_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS room_queries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        device_id TEXT NOT NULL,
        room_id TEXT NOT NULL,
        queried_at INTEGER NOT NULL
    )",
];

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unavailable(err.to_string())
            }
            _ => Self::Query(err.to_string()),
        }
    }
}

/// Gateway over a SQLite database.
pub struct SqliteGateway {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteGateway {
    /// Open the database and provision the schema.
    ///
    /// `database_url` is a sqlx SQLite URL, e.g. `sqlite://relay.db?mode=rwc`
    /// or `sqlite::memory:`.
    pub async fn connect(database_url: &str) -> Result<Self, GatewayError> {
        let in_memory = database_url.contains(":memory:");
        let mut options = SqlitePoolOptions::new();
        if in_memory {
            // Every connection to :memory: is a separate database; keep exactly one alive.
            options = options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else {
            options = options.max_connections(DEFAULT_MAX_CONNECTIONS);
        }
        let pool = options
            .connect(database_url)
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        let gateway = Self {
            pool,
            clock: Arc::new(SystemClock),
        };
        gateway.provision().await?;
        tracing::info!("SQLite store ready at {}", database_url);
        Ok(gateway)
    }

    async fn provision(&self) -> Result<(), GatewayError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for SqliteGateway {
    async fn room_exists(&self, room_id: &RoomId) -> Result<bool, GatewayError> {
        let row = sqlx::query("SELECT 1 FROM rooms WHERE room_id = ?")
            .bind(room_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn create_room(&self, room_id: &RoomId) -> Result<(), GatewayError> {
        sqlx::query("INSERT INTO rooms (room_id, created_at) VALUES (?, ?)")
            .bind(room_id.as_str())
            .bind(self.clock.now_millis())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn device_last_room(
        &self,
        device_id: &DeviceId,
    ) -> Result<Option<RoomId>, GatewayError> {
        let last_room = sqlx::query_scalar::<_, Option<String>>(
            "SELECT last_room_id FROM devices WHERE device_id = ?",
        )
        .bind(device_id.as_str())
        .fetch_optional(&self.pool)
        .await?
        .flatten();

        last_room
            .map(RoomId::try_from)
            .transpose()
            .map_err(|e| GatewayError::InvalidRecord(e.to_string()))
    }

    async fn upsert_device(
        &self,
        device_id: &DeviceId,
        room_id: &RoomId,
        identity: &Identity,
    ) -> Result<bool, GatewayError> {
        let now = self.clock.now_millis();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE devices
             SET last_connected_at = ?, last_room_id = ?, last_identity = ?
             WHERE device_id = ?",
        )
        .bind(now)
        .bind(room_id.as_str())
        .bind(identity.as_str())
        .bind(device_id.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let inserted = updated == 0;
        if inserted {
            sqlx::query(
                "INSERT INTO devices
                 (device_id, first_connected_at, last_connected_at, last_room_id, last_identity)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(device_id.as_str())
            .bind(now)
            .bind(now)
            .bind(room_id.as_str())
            .bind(identity.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn record_connection(
        &self,
        device_id: &DeviceId,
        room_id: &RoomId,
        identity: &Identity,
        client_address: &str,
    ) -> Result<ConnectionRecordId, GatewayError> {
        let result = sqlx::query(
            "INSERT INTO connections (device_id, room_id, identity, client_ip, connected_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(device_id.as_str())
        .bind(room_id.as_str())
        .bind(identity.as_str())
        .bind(client_address)
        .bind(self.clock.now_millis())
        .execute(&self.pool)
        .await?;

        Ok(ConnectionRecordId::new(result.last_insert_rowid()))
    }

    async fn record_disconnection(
        &self,
        record_id: ConnectionRecordId,
    ) -> Result<(), GatewayError> {
        sqlx::query(
            "UPDATE connections SET disconnected_at = ?
             WHERE id = ? AND disconnected_at IS NULL",
        )
        .bind(self.clock.now_millis())
        .bind(record_id.value())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_message(
        &self,
        from_device_id: &DeviceId,
        to_device_id: &DeviceId,
        room_id: &RoomId,
        payload: &str,
    ) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO messages (from_device_id, to_device_id, room_id, message_content, sent_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(from_device_id.as_str())
        .bind(to_device_id.as_str())
        .bind(room_id.as_str())
        .bind(payload)
        .bind(self.clock.now_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_room_query(
        &self,
        device_id: &DeviceId,
        room_id: &RoomId,
    ) -> Result<(), GatewayError> {
        sqlx::query("INSERT INTO room_queries (device_id, room_id, queried_at) VALUES (?, ?, ?)")
            .bind(device_id.as_str())
            .bind(room_id.as_str())
            .bind(self.clock.now_millis())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
