// WebSocket subscriber endpoint
//
// Each connection gets its own bounded queue from the hub; a forward task
// drains it into the socket while the read loop watches for close. Either
// side ending tears the whole connection down and detaches the subscriber.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (id, mut rx) = match state.relay.subscribe().await {
        Ok(pair) => pair,
        Err(e) => {
            warn!(error = %e, "failed to attach subscriber");
            return;
        }
    };
    info!(
        subscriber = id,
        clients = state.relay.health().clients,
        "dashboard client connected"
    );

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Forward the hub queue into the socket. The queue already starts with
    // the initial_data snapshot.
    let send_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_tx.send(Message::Text(payload)).await.is_err() {
                debug!("WebSocket send failed, client disconnected");
                break;
            }
        }
    });

    // Drain incoming frames until the client goes away. Subscribers are
    // consumers only; anything but close is ignored.
    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(error = %e, "WebSocket read error");
                break;
            }
        }
    }

    state.relay.unsubscribe(id);
    send_task.abort();
    info!(
        subscriber = id,
        clients = state.relay.health().clients,
        "dashboard client disconnected"
    );
}
