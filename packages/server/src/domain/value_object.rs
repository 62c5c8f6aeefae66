//! Value objects.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::ValueError;

/// Characters a room identifier is drawn from.
pub const ROOM_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of every room identifier.
pub const ROOM_ID_LENGTH: usize = 8;

/// Room identifier: 8 characters of uppercase A-Z and 0-9.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    /// Sample a fresh identifier from the alphabet.
    ///
    /// Uniqueness is not checked here; callers confirm it against storage.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let id = (0..ROOM_ID_LENGTH)
            .map(|_| ROOM_ID_ALPHABET[rng.random_range(0..ROOM_ID_ALPHABET.len())] as char)
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let well_formed = value.len() == ROOM_ID_LENGTH
            && value.bytes().all(|b| ROOM_ID_ALPHABET.contains(&b));
        if well_formed {
            Ok(Self(value))
        } else {
            Err(ValueError::MalformedRoomId(value))
        }
    }
}

impl From<RoomId> for String {
    fn from(value: RoomId) -> Self {
        value.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! non_empty_string {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValueError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                if value.is_empty() {
                    Err(ValueError::Empty($label))
                } else {
                    Ok(Self(value))
                }
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

non_empty_string!(
    /// Persistent device identity, stable across reconnects.
    DeviceId,
    "device_id"
);

non_empty_string!(
    /// Human-facing label supplied with each connection.
    Identity,
    "identity"
);

/// Process-local connection number. Allocated in increasing order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a persisted connection audit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionRecordId(i64);

impl ConnectionRecordId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ConnectionRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unix timestamp in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

/// Outcome tag describing how a room was resolved for a connecting device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    JoinedExisting,
    Reconnected,
    CreatedNew,
    RoomNotFound,
    /// Storage failed; the room is best-effort and was not persisted.
    Error,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JoinedExisting => "joined_existing",
            Self::Reconnected => "reconnected",
            Self::CreatedNew => "created_new",
            Self::RoomNotFound => "room_not_found",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_generated_room_id_uses_alphabet() {
        // テスト項目: 生成された RoomId は 8 文字で、英大文字と数字のみで構成される
        // given (前提条件):

        // when (操作):
        let ids: Vec<RoomId> = (0..200).map(|_| RoomId::generate()).collect();

        // then (期待する結果):
        for id in &ids {
            assert_eq!(id.as_str().len(), ROOM_ID_LENGTH);
            assert!(id.as_str().bytes().all(|b| ROOM_ID_ALPHABET.contains(&b)));
            assert!(RoomId::try_from(id.as_str().to_string()).is_ok());
        }
        let unique: HashSet<&RoomId> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_room_id_rejects_malformed_values() {
        // テスト項目: 長さ違い・小文字・記号を含む RoomId は拒否される
        // given (前提条件):
        let candidates = ["ABC", "ABCDEFGHI", "abcd1234", "ABCD-123", ""];

        for candidate in candidates {
            // when (操作):
            let result = RoomId::try_from(candidate.to_string());

            // then (期待する結果):
            assert_eq!(
                result,
                Err(ValueError::MalformedRoomId(candidate.to_string()))
            );
        }
    }

    #[test]
    fn test_empty_device_id_and_identity_are_rejected() {
        // テスト項目: 空文字列の DeviceId / Identity はエラーになる
        // given (前提条件):

        // when (操作):
        let device_id = DeviceId::try_from(String::new());
        let identity = Identity::try_from(String::new());

        // then (期待する結果):
        assert_eq!(device_id, Err(ValueError::Empty("device_id")));
        assert_eq!(identity, Err(ValueError::Empty("identity")));
        assert_eq!(
            DeviceId::try_from("D1".to_string()).unwrap().as_str(),
            "D1"
        );
    }

    #[test]
    fn test_assignment_status_wire_names() {
        // テスト項目: AssignmentStatus が snake_case でシリアライズされる
        // given (前提条件):
        let statuses = [
            AssignmentStatus::JoinedExisting,
            AssignmentStatus::Reconnected,
            AssignmentStatus::CreatedNew,
            AssignmentStatus::RoomNotFound,
            AssignmentStatus::Error,
        ];

        for status in statuses {
            // when (操作):
            let json = serde_json::to_string(&status).unwrap();

            // then (期待する結果):
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }
}
