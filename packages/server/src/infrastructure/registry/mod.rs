//! In-memory registries shared by every connection task.
//!
//! Each registry owns its lock; callers only see synchronized operations.
//! No registry lock is ever held across a storage call or a socket write.

pub mod connection;
pub mod room;

pub use connection::{ConnectionEntry, ConnectionRegistry};
pub use room::{RoomOverview, RoomRegistry};
