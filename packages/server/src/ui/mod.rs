//! UI layer: HTTP/WebSocket surface of the relay.

mod handler;
mod server;
mod signal;
pub mod state;
mod status;

pub use server::{Server, ServerConfig};
