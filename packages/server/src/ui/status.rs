//! Periodic status report of live connections and rooms.

use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;

use crate::usecase::{GetRoomsUseCase, RelayStatus};

/// Render a status report, one line per non-empty room after the summary line.
pub fn describe_status(status: &RelayStatus) -> Vec<String> {
    let mut lines = vec![format!(
        "Status: {} connections, {} rooms",
        status.open_connections,
        status.rooms.len()
    )];
    lines.extend(
        status
            .rooms
            .iter()
            .filter(|room| !room.members.is_empty())
            .map(|room| format!("  Room {}: {}", room.room_id, room.describe_members())),
    );
    lines
}

/// Log a status report every `period`, starting one period from now.
pub fn spawn_status_reporter(usecase: Arc<GetRoomsUseCase>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let status = usecase.status().await;
            for line in describe_status(&status) {
                tracing::info!("{}", line);
            }
        }
    })
}
