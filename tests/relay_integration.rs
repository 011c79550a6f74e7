//! Relay integration tests
//!
//! Starts the real subscriber endpoint (and, where needed, a mock upstream
//! feed) on ephemeral ports and drives them with real websocket clients.

use axum::{
    Router,
    extract::{
        State,
        ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use futures_util::{SinkExt, Stream, StreamExt};
use price_relay::{Hub, Ingester, create_router, spawn_workers};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};

// ============================================================================
// Test Fixtures
// ============================================================================

/// Start the relay's subscriber endpoint with a live worker pool.
async fn start_relay_server() -> (SocketAddr, Arc<Hub>) {
    let (hub, metric_rx) = Hub::new(64);
    spawn_workers(Arc::clone(&hub), metric_rx, 2);

    let app = create_router(Arc::clone(&hub));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give server time to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (addr, hub)
}

/// Start a mock upstream feed that serves the given frames to each
/// connection, then closes it.
async fn start_mock_upstream(frames: Vec<String>) -> SocketAddr {
    async fn handler(
        ws: WebSocketUpgrade,
        State(frames): State<Arc<Vec<String>>>,
    ) -> Response {
        ws.on_upgrade(move |socket| serve_frames(socket, frames))
    }

    async fn serve_frames(mut socket: WebSocket, frames: Arc<Vec<String>>) {
        for frame in frames.iter() {
            if socket
                .send(AxumMessage::Text(frame.clone().into()))
                .await
                .is_err()
            {
                return;
            }
        }
        let _ = socket.send(AxumMessage::Close(None)).await;
    }

    let app = Router::new()
        .route("/ws", get(handler))
        .with_state(Arc::new(frames));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    addr
}

/// Read the next text frame, failing the test on timeout or closure.
async fn next_text(
    stream: &mut (impl Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
              + Unpin),
) -> String {
    let msg = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("Timeout waiting for frame")
        .expect("Stream closed")
        .expect("Message error");

    match msg {
        Message::Text(text) => text.to_string(),
        other => panic!("Expected text frame, got {:?}", other),
    }
}

/// Wait until the registry reaches the expected size.
async fn wait_for_clients(hub: &Hub, expected: usize) {
    for _ in 0..40 {
        if hub.client_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!(
        "Registry never reached {} clients (at {})",
        expected,
        hub.client_count()
    );
}

// ============================================================================
// Subscriber Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_subscriber_connect_and_disconnect() {
    let (addr, hub) = start_relay_server().await;

    let url = format!("ws://{}/ws", addr);
    let (ws_stream, _response) = connect_async(&url).await.expect("Failed to connect");
    wait_for_clients(&hub, 1).await;

    drop(ws_stream);
    wait_for_clients(&hub, 0).await;
}

#[tokio::test]
async fn test_broadcast_reaches_every_subscriber() {
    let (addr, hub) = start_relay_server().await;
    let url = format!("ws://{}/ws", addr);

    let (mut client_a, _) = connect_async(&url).await.unwrap();
    let (mut client_b, _) = connect_async(&url).await.unwrap();
    let (mut client_c, _) = connect_async(&url).await.unwrap();
    wait_for_clients(&hub, 3).await;

    hub.broadcast(101.0).await.unwrap();

    assert_eq!(next_text(&mut client_a).await, "101.0");
    assert_eq!(next_text(&mut client_b).await, "101.0");
    assert_eq!(next_text(&mut client_c).await, "101.0");
}

#[tokio::test]
async fn test_departed_subscriber_is_pruned_and_rest_still_served() {
    let (addr, hub) = start_relay_server().await;
    let url = format!("ws://{}/ws", addr);

    let (mut client_a, _) = connect_async(&url).await.unwrap();
    let (mut client_b, _) = connect_async(&url).await.unwrap();
    let (mut client_c, _) = connect_async(&url).await.unwrap();
    wait_for_clients(&hub, 3).await;

    hub.broadcast(101.0).await.unwrap();
    assert_eq!(next_text(&mut client_a).await, "101.0");
    assert_eq!(next_text(&mut client_b).await, "101.0");
    assert_eq!(next_text(&mut client_c).await, "101.0");

    // One client goes away between rounds
    client_b.close(None).await.unwrap();
    wait_for_clients(&hub, 2).await;

    hub.broadcast(99.5).await.unwrap();
    assert_eq!(next_text(&mut client_a).await, "99.5");
    assert_eq!(next_text(&mut client_c).await, "99.5");
    assert_eq!(hub.client_count(), 2);
}

#[tokio::test]
async fn test_inbound_client_traffic_is_ignored() {
    let (addr, hub) = start_relay_server().await;
    let url = format!("ws://{}/ws", addr);

    let (mut client, _) = connect_async(&url).await.unwrap();
    wait_for_clients(&hub, 1).await;

    // Anything the client says is treated purely as a liveness signal
    client
        .send(Message::Text("subscribe please".into()))
        .await
        .unwrap();
    client
        .send(Message::Binary(vec![1, 2, 3].into()))
        .await
        .unwrap();

    hub.broadcast(55.5).await.unwrap();
    assert_eq!(next_text(&mut client).await, "55.5");
    assert_eq!(hub.client_count(), 1);
}

#[tokio::test]
async fn test_health_reports_client_count() {
    let (addr, hub) = start_relay_server().await;
    let url = format!("ws://{}/ws", addr);

    let (_client_a, _) = connect_async(&url).await.unwrap();
    let (_client_b, _) = connect_async(&url).await.unwrap();
    wait_for_clients(&hub, 2).await;

    let body: serde_json::Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["clients"], 2);
}

// ============================================================================
// Full Pipeline Tests (mock upstream -> ingester -> hub -> subscriber)
// ============================================================================

#[tokio::test]
async fn test_pipeline_broadcasts_mean_of_depth_frame() {
    let frame = r#"{
        "lastUpdateId": 160,
        "bids": [["100.0", "1"]],
        "asks": [["102.0", "1"]]
    }"#;
    let upstream_addr = start_mock_upstream(vec![frame.to_string()]).await;

    let (relay_addr, hub) = start_relay_server().await;
    let url = format!("ws://{}/ws", relay_addr);

    // Subscribe before ingestion starts so the first round has a member
    let (mut client, _) = connect_async(&url).await.unwrap();
    wait_for_clients(&hub, 1).await;

    let ingester = Ingester::connect(&format!("ws://{}/ws", upstream_addr))
        .await
        .expect("Failed to dial mock upstream");
    tokio::spawn(ingester.run(Arc::clone(&hub)));

    assert_eq!(next_text(&mut client).await, "101.0");
}

#[tokio::test]
async fn test_undecodable_frames_are_skipped_not_fatal() {
    let frames = vec![
        "not json at all".to_string(),
        r#"{"lastUpdateId": 1, "bids": [["10.0", "1"]], "asks": [["20.0", "1"]]}"#.to_string(),
    ];
    let upstream_addr = start_mock_upstream(frames).await;

    let (relay_addr, hub) = start_relay_server().await;
    let (mut client, _) = connect_async(format!("ws://{}/ws", relay_addr))
        .await
        .unwrap();
    wait_for_clients(&hub, 1).await;

    let ingester = Ingester::connect(&format!("ws://{}/ws", upstream_addr))
        .await
        .unwrap();
    tokio::spawn(ingester.run(Arc::clone(&hub)));

    // The bad frame is skipped; the good one still arrives
    assert_eq!(next_text(&mut client).await, "15.0");
}

#[tokio::test]
async fn test_upstream_close_ends_ingestion_but_not_subscribers() {
    let frame = r#"{"lastUpdateId": 1, "bids": [["100.0", "1"]], "asks": [["102.0", "1"]]}"#;
    let upstream_addr = start_mock_upstream(vec![frame.to_string()]).await;

    let (relay_addr, hub) = start_relay_server().await;
    let (mut client, _) = connect_async(format!("ws://{}/ws", relay_addr))
        .await
        .unwrap();
    wait_for_clients(&hub, 1).await;

    let ingester = Ingester::connect(&format!("ws://{}/ws", upstream_addr))
        .await
        .unwrap();
    let ingest_task = tokio::spawn(ingester.run(Arc::clone(&hub)));

    // The one metric produced before the upstream closed
    assert_eq!(next_text(&mut client).await, "101.0");

    // The ingest loop exits on its own...
    tokio::time::timeout(Duration::from_secs(2), ingest_task)
        .await
        .expect("Ingester never terminated")
        .unwrap();

    // ...while the subscriber stays registered and simply hears nothing
    assert_eq!(hub.client_count(), 1);
    let silent =
        tokio::time::timeout(Duration::from_millis(300), client.next()).await;
    assert!(silent.is_err(), "No further broadcasts should occur");
}

#[tokio::test]
async fn test_initial_upstream_dial_failure_is_an_error() {
    // Nothing listens here; the dial must fail rather than retry
    let result = Ingester::connect("ws://127.0.0.1:1/ws").await;
    assert!(result.is_err());
}
