//! Room registry: room id -> live member connections.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::domain::{ConnectionId, Member, Peer, RoomId, RoomView};

type Members = HashMap<ConnectionId, Member>;

/// Members of one room at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomOverview {
    pub room_id: RoomId,
    pub members: Vec<(ConnectionId, Peer)>,
}

impl RoomOverview {
    /// `id(device:identity)` for each member, ordered by connection id.
    pub fn describe_members(&self) -> String {
        self.members
            .iter()
            .map(|(id, peer)| format!("{}({}:{})", id, peer.device_id, peer.identity))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Concurrent mapping from room id to its member set.
///
/// Rooms are never removed; an emptied room keeps its entry so a device that
/// recorded it can come back to it.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, Members>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty entry for the room if none exists. Returns `true` if created.
    ///
    /// Lock: write, for one map lookup/insert.
    pub async fn ensure_room(&self, room_id: &RoomId) -> bool {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(room_id) {
            return false;
        }
        rooms.insert(room_id.clone(), Members::new());
        true
    }

    /// Add a member, creating the room entry if needed.
    ///
    /// Lock: write, for one insert.
    pub async fn join(&self, room_id: &RoomId, member: Member) {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room_id.clone())
            .or_default()
            .insert(member.connection_id, member);
    }

    /// Remove a member. Unknown rooms and non-members are a no-op.
    /// Returns `true` if a member was removed.
    ///
    /// Lock: write, for one removal.
    pub async fn leave(&self, room_id: &RoomId, connection_id: ConnectionId) -> bool {
        let mut rooms = self.rooms.write().await;
        rooms
            .get_mut(room_id)
            .is_some_and(|members| members.remove(&connection_id).is_some())
    }

    /// Members of the room except `excluding`.
    ///
    /// Lock: read, while copying the member list.
    pub async fn snapshot(&self, room_id: &RoomId, excluding: ConnectionId) -> Vec<Peer> {
        let rooms = self.rooms.read().await;
        rooms
            .get(room_id)
            .map(|members| {
                members
                    .values()
                    .filter(|m| m.connection_id != excluding)
                    .map(Member::peer)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of members in the room; 0 for unknown rooms.
    ///
    /// Lock: read.
    pub async fn size(&self, room_id: &RoomId) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(room_id).map_or(0, HashMap::len)
    }

    /// Total count and peer list taken under the same read lock, so the two
    /// always agree.
    ///
    /// Lock: read, while copying the member list.
    pub async fn view(&self, room_id: &RoomId, excluding: ConnectionId) -> RoomView {
        let rooms = self.rooms.read().await;
        let (total_members, peers) = match rooms.get(room_id) {
            Some(members) => (
                members.len(),
                members
                    .values()
                    .filter(|m| m.connection_id != excluding)
                    .map(Member::peer)
                    .collect(),
            ),
            None => (0, Vec::new()),
        };
        RoomView {
            room_id: room_id.clone(),
            total_members,
            peers,
        }
    }

    /// Call `f` for every member except `excluding`. Returns how many members were visited.
    ///
    /// Lock: read, for the whole iteration. `f` must not block or await;
    /// handing frames to [`Member::push`] is the intended use.
    pub async fn for_each_member<F>(
        &self,
        room_id: &RoomId,
        excluding: ConnectionId,
        mut f: F,
    ) -> usize
    where
        F: FnMut(&Member),
    {
        let rooms = self.rooms.read().await;
        let Some(members) = rooms.get(room_id) else {
            return 0;
        };
        let mut visited = 0;
        for member in members.values().filter(|m| m.connection_id != excluding) {
            f(member);
            visited += 1;
        }
        visited
    }

    /// Number of rooms with an entry, empty or not.
    ///
    /// Lock: read.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Members of a single room, ordered by connection id.
    ///
    /// Lock: read.
    pub async fn overview(&self, room_id: &RoomId) -> RoomOverview {
        let rooms = self.rooms.read().await;
        let members = rooms.get(room_id).map(describe).unwrap_or_default();
        RoomOverview {
            room_id: room_id.clone(),
            members,
        }
    }

    /// Every room with its members, ordered by room id.
    ///
    /// Lock: read, while copying all member lists.
    pub async fn overviews(&self) -> Vec<RoomOverview> {
        let rooms = self.rooms.read().await;
        let mut overviews: Vec<RoomOverview> = rooms
            .iter()
            .map(|(room_id, members)| RoomOverview {
                room_id: room_id.clone(),
                members: describe(members),
            })
            .collect();
        overviews.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        overviews
    }
}

fn describe(members: &Members) -> Vec<(ConnectionId, Peer)> {
    let mut described: Vec<(ConnectionId, Peer)> = members
        .values()
        .map(|m| (m.connection_id, m.peer()))
        .collect();
    described.sort_by_key(|(id, _)| *id);
    described
}
