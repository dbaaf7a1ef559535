use crate::routing::{route, Route};
use andro_core::{PeerRole, RelayMessage};
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tower_http::cors::CorsLayer;

struct Peer {
    role: PeerRole,
    tx: mpsc::UnboundedSender<String>,
}

/// Peers connected under one creature id.
type Rooms = Arc<RwLock<HashMap<String, HashMap<u64, Peer>>>>;

#[derive(Clone)]
struct RelayState {
    /// Shared secret; `None` refuses every peer
    token: Option<Arc<str>>,
    rooms: Rooms,
    next_peer: Arc<AtomicU64>,
}

/// The relay HTTP + WebSocket server.
///
/// - `GET /ws/{creature|pet|dashboard}/{id}?token=...`: join room `id`
/// - `GET /health`: health check
pub struct RelayServer {
    state: RelayState,
}

impl RelayServer {
    pub fn new(token: Option<String>) -> Self {
        let token: Option<Arc<str>> = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(Arc::from);
        if token.is_none() {
            tracing::warn!("No relay token configured, every peer will be refused");
        }
        Self {
            state: RelayState {
                token,
                rooms: Arc::new(RwLock::new(HashMap::new())),
                next_peer: Arc::new(AtomicU64::new(1)),
            },
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/ws/:role/:id", get(ws_upgrade))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Bind and serve in the background. Returns the bound address.
    pub async fn start(&self, addr: &str) -> Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Relay failed to bind {}", addr))?;
        let local = listener.local_addr()?;
        let app = self.router();
        tracing::info!("Relay listening on {}", local);

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Relay server error: {}", e);
            }
        });
        Ok((local, handle))
    }

    /// Number of peers currently connected under `id`.
    pub async fn peer_count(&self, id: &str) -> usize {
        self.state
            .rooms
            .read()
            .await
            .get(id)
            .map(HashMap::len)
            .unwrap_or(0)
    }
}

// ============================================================================
// Route handlers
// ============================================================================

async fn health() -> &'static str {
    "ok"
}

async fn ws_upgrade(
    Path((role, id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<RelayState>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    let provided = params.get("token").map(|t| t.trim()).unwrap_or_default();
    let authorized = matches!(&state.token, Some(expected) if !provided.is_empty() && provided == &**expected);
    if !authorized {
        tracing::debug!("Refusing peer for room {}: bad token", id);
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    let Some(role) = PeerRole::parse(&role) else {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };
    let Some(ws) = ws else {
        return (StatusCode::BAD_REQUEST, "Use websocket endpoint.").into_response();
    };

    ws.on_upgrade(move |socket| handle_peer(socket, state, role, id))
}

/// One connected peer: register, ack, then route until the socket closes.
async fn handle_peer(socket: WebSocket, state: RelayState, role: PeerRole, room: String) {
    let peer_id = state.next_peer.fetch_add(1, Ordering::Relaxed);
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    // Ack goes out before anything the room broadcasts
    send_json(&tx, &RelayMessage::ack_ok(role));

    state
        .rooms
        .write()
        .await
        .entry(room.clone())
        .or_default()
        .insert(peer_id, Peer { role, tx: tx.clone() });
    tracing::info!("{} joined room {} (peer {})", role.as_str(), room, peer_id);

    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_rx.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Message::Close(_) => break,
            _ => continue,
        };
        match route(role, &text) {
            Route::Forward { to, text } => broadcast(&state.rooms, &room, to, text).await,
            Route::Reject(err) => {
                tracing::debug!("Rejected message from peer {}: {}", peer_id, err);
                send_json(&tx, &err.ack());
            }
        }
    }

    {
        let mut rooms = state.rooms.write().await;
        if let Some(peers) = rooms.get_mut(&room) {
            peers.remove(&peer_id);
            if peers.is_empty() {
                rooms.remove(&room);
            }
        }
    }
    drop(tx);
    writer.abort();
    tracing::info!("{} left room {} (peer {})", role.as_str(), room, peer_id);
}

async fn broadcast(rooms: &Rooms, room: &str, to: PeerRole, text: String) {
    let rooms = rooms.read().await;
    let Some(peers) = rooms.get(room) else {
        return;
    };
    for peer in peers.values().filter(|p| p.role == to) {
        // A closed peer is cleaned up by its own handler
        let _ = peer.tx.send(text.clone());
    }
}

fn send_json(tx: &mpsc::UnboundedSender<String>, message: &RelayMessage) {
    match serde_json::to_string(message) {
        Ok(json) => {
            let _ = tx.send(json);
        }
        Err(e) => tracing::warn!("Failed to encode relay message: {}", e),
    }
}
