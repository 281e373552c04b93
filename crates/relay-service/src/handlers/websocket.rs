//! `GET /ws` upgrade handler.

use crate::routes::AppState;
use crate::signaling::serve_socket;

use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use std::sync::Arc;

/// Upgrade to a WebSocket and hand the socket to its connection task.
///
/// Frames larger than `max_message_bytes` fail the read and close the
/// connection.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let registry = state.registry.clone();
    let metrics = Arc::clone(&state.metrics);
    let settings = state.transport;

    ws.max_message_size(settings.max_message_bytes)
        .max_frame_size(settings.max_message_bytes)
        .on_upgrade(move |socket| serve_socket(socket, registry, metrics, settings))
}
