use andro_core::{CreatureStatus, RelayMessage};
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const OUTBOX_CAPACITY: usize = 32;
const MAX_BACKOFF_SECS: u64 = 30;

/// Why a connection ended.
enum Disconnect {
    /// The owning `RelayClient` was dropped
    Shutdown,
    Lost,
}

/// The creature's end of the relay.
///
/// Keeps a connection open in the background, reconnecting with backoff.
/// Outbound state snapshots are dropped rather than queued without bound
/// while the relay is unreachable.
pub struct RelayClient {
    url: Url,
    tx: mpsc::Sender<String>,
}

impl RelayClient {
    /// Join `{base}/creature/{id}?token=...`. Inbound dashboard messages
    /// arrive on the returned receiver.
    pub fn connect(
        base: &str,
        creature_id: &str,
        token: &str,
    ) -> Result<(Self, mpsc::Receiver<RelayMessage>)> {
        let url = Self::room_url(base, creature_id, token)?;
        let (tx, mut rx) = mpsc::channel::<String>(OUTBOX_CAPACITY);
        let (inbox_tx, inbox_rx) = mpsc::channel::<RelayMessage>(OUTBOX_CAPACITY);

        let client = Self {
            url: url.clone(),
            tx,
        };

        tokio::spawn(async move {
            let mut retry_count = 0u32;
            loop {
                tracing::info!("Connecting to relay at {}", redact(&url));
                match connect_async(&url).await {
                    Ok((ws_stream, _)) => {
                        tracing::info!("Connected to relay");
                        retry_count = 0;
                        match Self::handle_connection(ws_stream, &mut rx, &inbox_tx).await {
                            Ok(Disconnect::Shutdown) => return,
                            Ok(Disconnect::Lost) => tracing::warn!("Relay connection closed"),
                            Err(e) => tracing::warn!("Relay connection error: {}", e),
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to connect to relay: {}", e);
                        if retry_count < 6 {
                            retry_count += 1;
                        }
                    }
                }
                if rx.is_closed() {
                    return;
                }
                let wait_secs = MAX_BACKOFF_SECS.min(2u64.pow(retry_count));
                tracing::debug!("Reconnecting to relay in {}s", wait_secs);
                tokio::time::sleep(tokio::time::Duration::from_secs(wait_secs)).await;
            }
        });

        Ok((client, inbox_rx))
    }

    fn room_url(base: &str, creature_id: &str, token: &str) -> Result<Url> {
        let mut url = Url::parse(base).context("Invalid relay URL")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Relay URL cannot be a base: {}", base))?
            .pop_if_empty()
            .push("creature")
            .push(creature_id);
        url.query_pairs_mut().append_pair("token", token);
        Ok(url)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn handle_connection(
        stream: WsStream,
        rx: &mut mpsc::Receiver<String>,
        inbox: &mpsc::Sender<RelayMessage>,
    ) -> Result<Disconnect> {
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                incoming = read.next() => {
                    let Some(msg) = incoming else {
                        return Ok(Disconnect::Lost);
                    };
                    match msg? {
                        Message::Text(text) => match serde_json::from_str::<RelayMessage>(&text) {
                            Ok(message) => {
                                if inbox.send(message).await.is_err() {
                                    return Ok(Disconnect::Shutdown);
                                }
                            }
                            Err(e) => tracing::debug!("Ignoring relay message ({}): {}", e, text),
                        },
                        Message::Close(_) => return Ok(Disconnect::Lost),
                        _ => {}
                    }
                }
                outgoing = rx.recv() => {
                    let Some(json) = outgoing else {
                        let _ = write.send(Message::Close(None)).await;
                        return Ok(Disconnect::Shutdown);
                    };
                    write.send(Message::Text(json)).await?;
                }
            }
        }
    }

    /// Publish a state snapshot to dashboards. Never waits on the network.
    pub fn publish(&self, status: CreatureStatus) {
        self.send(&RelayMessage::State(status));
    }

    fn send(&self, message: &RelayMessage) {
        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to encode relay message: {}", e);
                return;
            }
        };
        if let Err(e) = self.tx.try_send(json) {
            tracing::debug!("Relay outbox unavailable, dropping message: {}", e);
        }
    }
}

/// The URL without its token, for logs.
fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}
