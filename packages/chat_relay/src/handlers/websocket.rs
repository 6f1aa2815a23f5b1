use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};

use crate::server::AppState;
use crate::ws::{EnvelopeCodec, serve_connection};

/// Raw message protocol: `{"type": "chat", ...}`
pub async fn raw_websocket_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| serve_connection(socket, EnvelopeCodec, state))
}
