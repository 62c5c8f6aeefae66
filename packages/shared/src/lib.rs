//! Utilities shared by the room relay packages: logging setup and time helpers.

pub mod logger;
pub mod time;
