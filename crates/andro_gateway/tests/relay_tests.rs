//! Relay server end to end over real sockets.

use andro_core::{CreatureStatus, Emotion, Mode, Mood, RelayMessage, SystemMode};
use andro_gateway::{RelayClient, RelayServer};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TOKEN: &str = "t0ken";

async fn start() -> (RelayServer, SocketAddr) {
    let server = RelayServer::new(Some(TOKEN.to_string()));
    let (addr, _handle) = server.start("127.0.0.1:0").await.unwrap();
    (server, addr)
}

async fn join(addr: SocketAddr, role: &str, id: &str) -> Ws {
    let url = format!("ws://{}/ws/{}/{}?token={}", addr, role, id, TOKEN);
    let (ws, _) = connect_async(url.as_str()).await.expect("connect");
    ws
}

async fn next_json(ws: &mut Ws) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out")
            .expect("stream ended")
            .expect("socket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("relay sent bad json");
        }
    }
}

async fn send(ws: &mut Ws, text: &str) {
    ws.send(Message::Text(text.to_string())).await.unwrap();
}

fn status() -> CreatureStatus {
    CreatureStatus {
        emotion: Emotion::Happy,
        mode: Mode::Chill,
        mood: Mood::Calm,
        system_mode: SystemMode::Active,
        sleeping: false,
        energy: 80.0,
        curiosity: 40.0,
        social_need: 30.0,
        care_points: 2,
        battery_level: None,
    }
}

// ============================================================================
// HTTP surface
// ============================================================================

#[tokio::test]
async fn test_auth_and_paths() {
    let (_server, addr) = start().await;
    let http = reqwest::Client::new();
    let get = |path: String| {
        let http = http.clone();
        async move { http.get(format!("http://{}{}", addr, path)).send().await.unwrap().status().as_u16() }
    };

    assert_eq!(get("/health".to_string()).await, 200);
    assert_eq!(get("/ws/dashboard/emo".to_string()).await, 401);
    assert_eq!(get("/ws/dashboard/emo?token=".to_string()).await, 401);
    assert_eq!(get("/ws/dashboard/emo?token=wrong".to_string()).await, 401);
    assert_eq!(get(format!("/ws/robot/emo?token={}", TOKEN)).await, 404);
    assert_eq!(get(format!("/elsewhere?token={}", TOKEN)).await, 404);
    assert_eq!(get(format!("/ws/dashboard/emo?token={}", TOKEN)).await, 400);
}

#[tokio::test]
async fn test_no_token_configured_refuses_everyone() {
    let server = RelayServer::new(None);
    let (addr, _handle) = server.start("127.0.0.1:0").await.unwrap();
    let status = reqwest::get(format!("http://{}/ws/creature/emo?token=anything", addr))
        .await
        .unwrap()
        .status();
    assert_eq!(status.as_u16(), 401);
}

// ============================================================================
// Routing
// ============================================================================

#[tokio::test]
async fn test_ack_on_connect() {
    let (_server, addr) = start().await;
    let mut creature = join(addr, "pet", "emo").await;
    assert_eq!(
        next_json(&mut creature).await,
        json!({"type": "ack", "role": "creature", "ok": true})
    );
    let mut dash = join(addr, "dashboard", "emo").await;
    assert_eq!(
        next_json(&mut dash).await,
        json!({"type": "ack", "role": "dashboard", "ok": true})
    );
}

#[tokio::test]
async fn test_fan_out_within_room() {
    let (server, addr) = start().await;
    let mut creature = join(addr, "creature", "emo").await;
    let mut dash_a = join(addr, "dashboard", "emo").await;
    let mut dash_b = join(addr, "dashboard", "emo").await;
    let mut stranger = join(addr, "dashboard", "other").await;
    for ws in [&mut creature, &mut dash_a, &mut dash_b, &mut stranger] {
        next_json(ws).await;
    }
    assert_eq!(server.peer_count("emo").await, 3);

    send(&mut creature, r#"{"type":"state","emotion":"happy"}"#).await;
    for dash in [&mut dash_a, &mut dash_b] {
        assert_eq!(
            next_json(dash).await,
            json!({"type": "state", "emotion": "happy"})
        );
    }

    send(&mut dash_a, r#"{"type":"command","action":"feed","payload":{}}"#).await;
    assert_eq!(
        next_json(&mut creature).await,
        json!({"type": "command", "action": "feed", "payload": {}})
    );

    send(&mut dash_b, r#"{"type":"request_state"}"#).await;
    assert_eq!(next_json(&mut creature).await, json!({"type": "request_state"}));

    // The other room saw nothing; its next message is the reply to its own error
    send(&mut stranger, "{broken").await;
    assert_eq!(
        next_json(&mut stranger).await,
        json!({"type": "ack", "ok": false, "error": "invalid-json"})
    );
}

#[tokio::test]
async fn test_rejections() {
    let (_server, addr) = start().await;
    let mut creature = join(addr, "creature", "emo").await;
    next_json(&mut creature).await;

    send(&mut creature, r#"{"type":"command","action":"wake"}"#).await;
    assert_eq!(
        next_json(&mut creature).await,
        json!({"type": "ack", "ok": false, "error": "unsupported-message"})
    );
    send(&mut creature, "42").await;
    assert_eq!(
        next_json(&mut creature).await,
        json!({"type": "ack", "ok": false, "error": "invalid-payload"})
    );
}

#[tokio::test]
async fn test_peer_removed_on_close() {
    let (server, addr) = start().await;
    let mut dash = join(addr, "dashboard", "emo").await;
    next_json(&mut dash).await;
    assert_eq!(server.peer_count("emo").await, 1);

    dash.close(None).await.unwrap();
    for _ in 0..50 {
        if server.peer_count("emo").await == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("peer still registered after close");
}

// ============================================================================
// Creature client
// ============================================================================

#[tokio::test]
async fn test_client_round_trip() {
    let (server, addr) = start().await;
    let (client, mut inbox) =
        RelayClient::connect(&format!("ws://{}/ws", addr), "emo", TOKEN).unwrap();
    let mut dash = join(addr, "dashboard", "emo").await;
    next_json(&mut dash).await;

    for _ in 0..100 {
        if server.peer_count("emo").await == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(server.peer_count("emo").await, 2);

    // The relay's own ack comes first
    let ack = tokio::time::timeout(Duration::from_secs(5), inbox.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(ack, RelayMessage::Ack { ok: true, .. }));

    send(&mut dash, r#"{"type":"command","action":"mode","payload":{"mode":"focus"}}"#).await;
    let command = tokio::time::timeout(Duration::from_secs(5), inbox.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        command,
        RelayMessage::Command {
            action: "mode".to_string(),
            payload: json!({"mode": "focus"}),
        }
    );

    client.publish(status());
    let state = next_json(&mut dash).await;
    assert_eq!(state["type"], "state");
    assert_eq!(state["emotion"], "happy");
    assert_eq!(state["care_points"], 2);
}
