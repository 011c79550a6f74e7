//! Subscriber-facing websocket endpoint.
//!
//! Upgrades clients at `/ws`, registers them with the hub, and keeps two
//! tasks per connection: one forwarding broadcast frames from the client's
//! channel into the socket, one blocking on inbound traffic purely to
//! notice disconnects. Inbound payloads are never interpreted.

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::hub::Hub;

/// Build the subscriber router.
pub fn create_router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(hub)
        .layer(TraceLayer::new_for_http())
}

async fn health_handler(State(hub): State<Arc<Hub>>) -> impl IntoResponse {
    format!(r#"{{"status":"ok","clients":{}}}"#, hub.client_count())
}

/// Handle websocket upgrade
async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<Arc<Hub>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Handle one subscriber connection
async fn handle_socket(socket: WebSocket, hub: Arc<Hub>) {
    let (mut sender, mut receiver) = socket.split();

    // Outbound path: the hub writes into this channel, the task below
    // writes into the socket.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let client_id = hub.join(tx);

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    // Liveness read loop: the only thing inbound traffic signals is that
    // the connection is still alive.
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(client = client_id, "client read error: {}", e);
                break;
            }
        }
    }

    // Cleanup
    hub.leave(client_id);
    send_task.abort();
}
