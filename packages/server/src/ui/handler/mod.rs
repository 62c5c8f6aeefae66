//! Request handlers.

mod handshake;
mod http;
mod lifecycle;
mod router;
mod websocket;

pub use http::{get_rooms, health_check};
pub use websocket::websocket_handler;
