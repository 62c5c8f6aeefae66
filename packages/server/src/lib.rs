//! Room relay server library.
//!
//! Groups WebSocket connections into rooms identified by 8-character codes,
//! lets devices rejoin their last room automatically, and relays JSON frames
//! between room members while recording history through a persistence gateway.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
