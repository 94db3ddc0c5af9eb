//! Integration tests for WebSocket event streaming.
//!
//! These tests run the real HTTP server on an ephemeral port, drive the quiz
//! over the REST API and watch the events arrive on WebSocket clients.

use std::sync::Arc;
use std::time::Duration;

use futures::SinkExt;
use futures::StreamExt;
use radsim_engine::{
    create_router, AppState, Catalog, Config, QuizEngine, QuizEvent, QuizSnapshot, QuizState,
};
use radsim_report::FileExporter;
use radsim_scene::HeadlessScene;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tungstenite::Message;

/// Helper type for WebSocket client
type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A running test server.
struct TestServer {
    base_url: String,
    ws_url: String,
    _handle: tokio::task::JoinHandle<()>,
}

fn test_state() -> AppState {
    let config = Config::default();
    let engine = QuizEngine::new(config.clone(), Catalog::reference(), HeadlessScene::new());
    let reports = std::env::temp_dir().join(format!(
        "radsim-ws-{}",
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    AppState::new(config, engine).with_exporter(Arc::new(FileExporter::new(reports)))
}

/// Spawns the server on an ephemeral port.
async fn spawn_test_server(state: AppState) -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");

    let router = create_router(state);
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    TestServer {
        base_url: format!("http://{addr}/api"),
        ws_url: format!("ws://{addr}/api/ws"),
        _handle: handle,
    }
}

/// Connects a WebSocket client to the given URL.
async fn connect_client(url: &str) -> WsClient {
    let (ws_stream, _) = connect_async(url)
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream
}

/// Receives the next text message and parses it as a `QuizEvent`.
/// Answers pings along the way.
async fn receive_event(client: &mut WsClient) -> QuizEvent {
    loop {
        let msg = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("Timeout waiting for message")
            .expect("Stream ended")
            .expect("WebSocket error");

        match msg {
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("Failed to parse event");
            }
            Message::Ping(data) => {
                client
                    .send(Message::Pong(data))
                    .await
                    .expect("Failed to send pong");
            }
            Message::Pong(_) => {}
            other => panic!("Expected text message, got: {other:?}"),
        }
    }
}

/// Sends a POST to the API and returns the JSON body.
async fn post(server: &TestServer, path: &str, body: Option<serde_json::Value>) -> serde_json::Value {
    let client = reqwest::Client::new();
    let mut request = client.post(format!("{}{path}", server.base_url));
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await.expect("Request failed");
    assert!(
        response.status().is_success(),
        "POST {path} returned {}",
        response.status()
    );
    response.json().await.expect("Invalid JSON body")
}

// ============================================================================
// Connection Tests
// ============================================================================

/// Tests that a client receives the current snapshot on connect.
#[tokio::test]
async fn test_client_receives_connected_event_on_connect() {
    let server = spawn_test_server(test_state()).await;

    let mut client = connect_client(&server.ws_url).await;
    let event = receive_event(&mut client).await;

    match event {
        QuizEvent::Connected(payload) => {
            assert_eq!(payload.snapshot.state, QuizState::Intro);
            assert_eq!(payload.snapshot.total_exercises, 5);
        }
        other => panic!("Expected Connected event, got: {other:?}"),
    }
}

/// Tests that the connected snapshot reflects a session already under way.
#[tokio::test]
async fn test_connected_event_contains_current_state() {
    let state = test_state();
    {
        let mut engine = state.engine.lock().await;
        engine.start().expect("start");
        engine.confirm_lab(true).expect("confirm");
    }
    let server = spawn_test_server(state).await;

    let mut client = connect_client(&server.ws_url).await;
    let event = receive_event(&mut client).await;

    match event {
        QuizEvent::Connected(payload) => {
            assert_eq!(payload.snapshot.exercise_index, Some(0));
            assert_eq!(payload.snapshot.progress.as_deref(), Some("1/5"));
            assert!(payload.snapshot.controls_enabled);
        }
        other => panic!("Expected Connected event, got: {other:?}"),
    }
}

// ============================================================================
// Event Broadcast Tests
// ============================================================================

/// Tests that API calls are streamed to every connected client.
#[tokio::test]
async fn test_api_events_broadcast_to_all_clients() {
    let server = spawn_test_server(test_state()).await;

    let mut client1 = connect_client(&server.ws_url).await;
    let mut client2 = connect_client(&server.ws_url).await;
    receive_event(&mut client1).await;
    receive_event(&mut client2).await;

    post(&server, "/session/start", None).await;

    for client in [&mut client1, &mut client2] {
        match receive_event(client).await {
            QuizEvent::SessionStarted(payload) => assert_eq!(payload.total_exercises, 5),
            other => panic!("Expected SessionStarted event, got: {other:?}"),
        }
    }
}

/// Tests the event sequence of a wrong placement followed by a pass.
#[tokio::test]
async fn test_verification_events_stream_in_order() {
    let server = spawn_test_server(test_state()).await;
    let mut client = connect_client(&server.ws_url).await;
    receive_event(&mut client).await;

    post(&server, "/session/start", None).await;
    post(
        &server,
        "/session/confirm",
        Some(serde_json::json!({ "confirmed": true })),
    )
    .await;

    assert_eq!(receive_event(&mut client).await.event_name(), "session_started");
    match receive_event(&mut client).await {
        QuizEvent::AttemptStarted(payload) => {
            assert_eq!(payload.index, 0);
            assert_eq!(payload.title, "PA Hand");
            assert_eq!(payload.time_remaining, 60);
        }
        other => panic!("Expected AttemptStarted event, got: {other:?}"),
    }

    post(
        &server,
        "/pose/position",
        Some(serde_json::json!({ "x": 5, "y": 5, "z": 5 })),
    )
    .await;
    let body = post(&server, "/verify", None).await;
    assert_eq!(body["verification"]["reason"], "wrong_placement");

    match receive_event(&mut client).await {
        QuizEvent::Verified(payload) => assert!(!payload.verification.pass),
        other => panic!("Expected Verified event, got: {other:?}"),
    }

    post(
        &server,
        "/pose/position",
        Some(serde_json::json!({ "x": 0.61, "y": -8.89, "z": -7.22 })),
    )
    .await;
    let body = post(&server, "/verify", None).await;
    let snapshot: QuizSnapshot =
        serde_json::from_value(body["snapshot"].clone()).expect("snapshot");
    assert!(snapshot.can_proceed);

    match receive_event(&mut client).await {
        QuizEvent::Verified(payload) => assert!(payload.verification.pass),
        other => panic!("Expected Verified event, got: {other:?}"),
    }
    assert_eq!(receive_event(&mut client).await.event_name(), "attempt_finished");
}

/// Tests that finishing early streams the completion event with its report.
#[tokio::test]
async fn test_session_complete_event_carries_report() {
    let server = spawn_test_server(test_state()).await;
    let mut client = connect_client(&server.ws_url).await;
    receive_event(&mut client).await;

    post(&server, "/session/start", None).await;
    post(
        &server,
        "/session/confirm",
        Some(serde_json::json!({ "confirmed": true })),
    )
    .await;
    post(&server, "/session/finish", None).await;

    let event = loop {
        let event = receive_event(&mut client).await;
        if event.event_name() == "session_complete" {
            break event;
        }
    };
    let report = event.report().expect("report");
    assert_eq!(report.records.len(), 5);
    assert_eq!(report.passed_count, 0);

    let fetched: serde_json::Value = reqwest::get(format!("{}/report", server.base_url))
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON body");
    assert_eq!(fetched["total_exercises"], 5);
}

/// Tests that a client disconnect does not disturb the others.
#[tokio::test]
async fn test_client_disconnect_leaves_others_connected() {
    let state = test_state();
    let broadcaster = state.broadcaster.clone();
    let server = spawn_test_server(state).await;

    let mut client1 = connect_client(&server.ws_url).await;
    let mut client2 = connect_client(&server.ws_url).await;
    receive_event(&mut client1).await;
    receive_event(&mut client2).await;

    client1.close(None).await.expect("close");
    drop(client1);

    post(&server, "/session/start", None).await;
    assert_eq!(receive_event(&mut client2).await.event_name(), "session_started");

    // the closed socket's subscription is dropped eventually
    for _ in 0..50 {
        if broadcaster.receiver_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(broadcaster.receiver_count(), 1);
}
