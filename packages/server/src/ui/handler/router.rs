//! Dispatch of frames received on an Active connection.

use crate::{
    infrastructure::dto::websocket::{ErrorMessage, InboundFrame, RoomInfoMessage, encode},
    ui::state::AppState,
    usecase::ActiveConnection,
};

/// Reply to a frame that is not a JSON object.
pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON format";

/// Route one inbound frame. Returns the frame to send back to the origin, if any.
pub async fn route_frame(
    state: &AppState,
    origin: &ActiveConnection,
    text: &str,
) -> Result<Option<String>, serde_json::Error> {
    let frame = match InboundFrame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(
                "Connection {} sent a frame that is not a JSON object: {}",
                origin.connection_id,
                e
            );
            return encode(&ErrorMessage::new(INVALID_JSON_MESSAGE)).map(Some);
        }
    };

    if frame.is_query_room() {
        let view = state.route_message_usecase.query_room(origin).await;
        // Domain Model から DTO への変換
        let reply = RoomInfoMessage::from(view);
        return encode(&reply).map(Some);
    }

    state.route_message_usecase.relay(origin, text).await;
    Ok(None)
}
