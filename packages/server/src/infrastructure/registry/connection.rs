//! Connection registry: every live transport session, handshaken or not.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use roomrelay_shared::time::get_timestamp;
use tokio::sync::RwLock;

use crate::domain::{ConnectionId, Timestamp};

/// Bookkeeping for one live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEntry {
    pub client_address: String,
    pub connected_at: Timestamp,
}

/// Live connections plus the process-wide connection id allocator.
#[derive(Debug)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    connections: RwLock<HashMap<ConnectionId, ConnectionEntry>>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            connections: RwLock::new(HashMap::new()),
        }
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next connection id and register the connection under it.
    ///
    /// Ids come from an atomic counter, so they are unique for the process
    /// lifetime and increase with registration order.
    ///
    /// Lock: write, for one insert.
    pub async fn register(&self, client_address: impl Into<String>) -> ConnectionId {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = ConnectionEntry {
            client_address: client_address.into(),
            connected_at: Timestamp::new(get_timestamp()),
        };
        self.connections.write().await.insert(id, entry);
        id
    }

    /// Remove the connection. Returns its entry the first time, `None` afterwards.
    ///
    /// Lock: write, for one removal.
    pub async fn unregister(&self, id: ConnectionId) -> Option<ConnectionEntry> {
        self.connections.write().await.remove(&id)
    }

    /// Lock: read.
    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }
}
