//! Conversion logic between DTOs and domain / registry types.

use crate::{
    domain::{Peer, RoomView},
    infrastructure::{
        dto::{http, websocket},
        registry::RoomOverview,
    },
};

impl From<Peer> for websocket::ClientInfo {
    fn from(peer: Peer) -> Self {
        Self {
            device_id: peer.device_id.into_string(),
            identity: peer.identity.into_string(),
        }
    }
}

impl From<RoomView> for websocket::RoomInfoMessage {
    fn from(view: RoomView) -> Self {
        Self {
            r#type: websocket::MessageType::RoomInfo,
            room_id: view.room_id.into_string(),
            total_clients: view.total_members,
            clients: view.peers.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<RoomOverview> for http::RoomSummaryDto {
    fn from(overview: RoomOverview) -> Self {
        Self {
            id: overview.room_id.into_string(),
            total_clients: overview.members.len(),
            members: overview
                .members
                .into_iter()
                .map(|(_, peer)| http::MemberDto {
                    device_id: peer.device_id.into_string(),
                    identity: peer.identity.into_string(),
                })
                .collect(),
        }
    }
}
