//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};

/// One peer inside a room summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDto {
    pub device_id: String,
    pub identity: String,
}

/// Live room with its current members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummaryDto {
    pub id: String,
    pub total_clients: usize,
    pub members: Vec<MemberDto>,
}
