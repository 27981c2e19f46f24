use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Value};
use tokio_tungstenite::connect_async;

use pulse_core::{Relay, RelayConfig};
use pulse_relay::router;

async fn spawn_server() -> (String, String) {
    let relay = Arc::new(Relay::open(RelayConfig::default()).expect("relay opens"));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router(relay)).await.expect("server runs");
    });
    (format!("http://{addr}"), format!("ws://{addr}/ws"))
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn next_message(ws: &mut WsStream) -> Value {
    let message = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("message within timeout")
        .expect("stream open")
        .expect("frame ok");
    let text = message.into_text().expect("text frame");
    serde_json::from_str(&text).expect("valid json")
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let (base, _ws) = spawn_server().await;

    let body: Value = reqwest::get(format!("{base}/health"))
        .await
        .expect("request ok")
        .json()
        .await
        .expect("json body");

    assert_eq!(body["status"], "ok");
    assert_eq!(body["clients"], 0);
    assert!(body["uptime"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn ingest_flows_to_connected_subscriber() {
    let (base, ws_url) = spawn_server().await;
    let client = reqwest::Client::new();

    let (mut ws, _) = connect_async(ws_url.as_str()).await.expect("ws connects");

    let initial = next_message(&mut ws).await;
    assert_eq!(initial["type"], "initial_data");
    assert!(initial["data"]["sessions"].as_array().unwrap().is_empty());

    let ack: Value = client
        .post(format!("{base}/api/session/start"))
        .json(&json!({ "sessionId": "s1", "agentName": "Bot", "model": "m1" }))
        .send()
        .await
        .expect("post ok")
        .json()
        .await
        .expect("json ack");
    assert_eq!(ack["success"], true);
    assert_eq!(ack["sessionId"], "s1");

    let message = next_message(&mut ws).await;
    assert_eq!(message["type"], "session_start");
    assert_eq!(message["data"]["sessionId"], "s1");
    assert_eq!(message["data"]["agentName"], "Bot");

    let ack: Value = client
        .post(format!("{base}/api/tokens"))
        .json(&json!({ "sessionId": "s1", "inputTokens": 100, "outputTokens": 50 }))
        .send()
        .await
        .expect("post ok")
        .json()
        .await
        .expect("json ack");
    assert_eq!(ack["success"], true);
    assert_eq!(ack["total"], 150);

    let message = next_message(&mut ws).await;
    assert_eq!(message["type"], "token_usage");
    assert_eq!(message["data"]["tokenUsage"]["total"], 150);
}

#[tokio::test]
async fn late_subscriber_gets_snapshot_without_replay() {
    let (base, ws_url) = spawn_server().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{base}/api/session/start"))
        .json(&json!({ "sessionId": "s1", "agentName": "Bot", "model": "m1" }))
        .send()
        .await
        .expect("post ok");
    client
        .post(format!("{base}/api/task/start"))
        .json(&json!({ "taskId": "t1", "sessionId": "s1", "description": "fix bug", "priority": "high" }))
        .send()
        .await
        .expect("post ok");
    client
        .post(format!("{base}/api/task/complete"))
        .json(&json!({ "taskId": "t1", "status": "success", "duration": 500 }))
        .send()
        .await
        .expect("post ok");

    let (mut ws, _) = connect_async(ws_url.as_str()).await.expect("ws connects");
    let initial = next_message(&mut ws).await;
    assert_eq!(initial["type"], "initial_data");
    assert_eq!(initial["data"]["sessions"][0]["sessionId"], "s1");
    assert_eq!(initial["data"]["tasks"][0]["status"], "success");
    assert_eq!(initial["data"]["tasks"][0]["duration"], 500);

    // Nothing covered by the snapshot is replayed
    let silence = tokio::time::timeout(Duration::from_millis(300), ws.next()).await;
    assert!(silence.is_err(), "no replay after initial_data");
}

#[tokio::test]
async fn invalid_enum_value_is_rejected_with_400() {
    let (base, _ws) = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/api/task/start"))
        .json(&json!({ "taskId": "t1", "sessionId": "s1", "description": "x", "priority": "urgent" }))
        .send()
        .await
        .expect("post ok");
    assert_eq!(response.status().as_u16(), 400);

    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("priority"));
}

#[tokio::test]
async fn negative_token_count_is_rejected_with_400() {
    let (base, _ws) = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/api/tokens"))
        .json(&json!({ "sessionId": "s1", "inputTokens": -5, "outputTokens": 0 }))
        .send()
        .await
        .expect("post ok");
    assert_eq!(response.status().as_u16(), 400);

    let body: Value = response.json().await.expect("json body");
    assert!(body["error"].as_str().unwrap().contains("inputTokens"));
}

#[tokio::test]
async fn duplicate_session_start_conflicts_with_409() {
    let (base, _ws) = spawn_server().await;
    let client = reqwest::Client::new();
    let body = json!({ "sessionId": "s1", "agentName": "Bot", "model": "m1" });

    let first = client
        .post(format!("{base}/api/session/start"))
        .json(&body)
        .send()
        .await
        .expect("post ok");
    assert_eq!(first.status().as_u16(), 200);

    let second = client
        .post(format!("{base}/api/session/start"))
        .json(&body)
        .send()
        .await
        .expect("post ok");
    assert_eq!(second.status().as_u16(), 409);
}

#[tokio::test]
async fn error_event_reaches_subscriber_with_default_severity() {
    let (base, ws_url) = spawn_server().await;
    let client = reqwest::Client::new();

    let (mut ws, _) = connect_async(ws_url.as_str()).await.expect("ws connects");
    let _initial = next_message(&mut ws).await;

    let ack: Value = client
        .post(format!("{base}/api/error"))
        .json(&json!({ "sessionId": "s1", "message": "boom" }))
        .send()
        .await
        .expect("post ok")
        .json()
        .await
        .expect("json ack");
    assert_eq!(ack["success"], true);

    let message = next_message(&mut ws).await;
    assert_eq!(message["type"], "error");
    assert_eq!(message["data"]["severity"], "error");
    assert_eq!(message["data"]["errorMessage"], "boom");
}

#[tokio::test]
async fn disconnecting_subscriber_frees_its_slot() {
    let (base, ws_url) = spawn_server().await;

    let (mut ws, _) = connect_async(ws_url.as_str()).await.expect("ws connects");
    let _initial = next_message(&mut ws).await;

    let health: Value = reqwest::get(format!("{base}/health"))
        .await
        .expect("request ok")
        .json()
        .await
        .expect("json body");
    assert_eq!(health["clients"], 1);

    drop(ws);
    // Give the server a moment to observe the close
    tokio::time::sleep(Duration::from_millis(200)).await;

    let health: Value = reqwest::get(format!("{base}/health"))
        .await
        .expect("request ok")
        .json()
        .await
        .expect("json body");
    assert_eq!(health["clients"], 0);
}

#[tokio::test]
async fn metrics_endpoint_derives_from_state() {
    let (base, _ws) = spawn_server().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{base}/api/session/start"))
        .json(&json!({ "sessionId": "s1", "agentName": "Bot", "model": "m1" }))
        .send()
        .await
        .expect("post ok");
    client
        .post(format!("{base}/api/tokens"))
        .json(&json!({ "sessionId": "s1", "inputTokens": 100, "outputTokens": 50 }))
        .send()
        .await
        .expect("post ok");

    let metrics: Value = reqwest::get(format!("{base}/api/metrics"))
        .await
        .expect("request ok")
        .json()
        .await
        .expect("json body");
    assert_eq!(metrics["totalTokens"], 150);
    assert_eq!(metrics["activeAgents"], 1);
    assert_eq!(metrics["pendingTasks"], 0);
}
