//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        Path, State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};

use crate::{
    domain::StreamKind,
    hub::{MAX_MESSAGE_SIZE, Subscriber},
    ui::state::AppState,
};

/// Upgrade `/ws/{stream}` and attach the connection to that stream's hub.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(stream): Path<StreamKind>,
) -> impl IntoResponse {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state, stream))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, stream: StreamKind) {
    let dashboard = &state.dashboard;

    let subscription = dashboard.subscribe(stream).await;
    Subscriber::new(dashboard.hub(stream).clone(), socket)
        .attach(subscription.registration, subscription.preamble)
        .await;
    tracing::debug!(stream = %stream, "Subscriber disconnected");
}
