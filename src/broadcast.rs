//! WebSocket fan-out to the device-side display.
//!
//! The listener accepts connections indefinitely with no authentication;
//! the channel only ever exists on a trusted local link (USB via the adb
//! reverse mapping, or the LAN). Delivery is at-most-once, best-effort.

use std::collections::BTreeMap;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use crate::status::{ActiveStreams, NetworkBandwidth, RecentlyAdded, StatusSnapshot, Transcoding};

/// Port the display connects to; also the target of the adb reverse mapping.
pub const BROADCAST_PORT: u16 = 8891;

/// Capacity per client before a slow consumer starts skipping updates.
const CHANNEL_CAPACITY: usize = 16;

// ── Wire message ─────────────────────────────────────────────────────────────

/// The single message type the device receives, pushed every cycle.
#[derive(Serialize)]
pub struct StatusMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(rename = "serverStatus")]
    server_status: ServerStatus,
    #[serde(rename = "libraryStats")]
    library_stats: &'a BTreeMap<String, u64>,
    #[serde(rename = "recentlyAdded")]
    recently_added: &'a Option<RecentlyAdded>,
    #[serde(rename = "networkBandwidth")]
    network_bandwidth: &'a NetworkBandwidth,
    #[serde(rename = "activeStreams")]
    active_streams: &'a ActiveStreams,
    transcoding: &'a Transcoding,
}

#[derive(Serialize)]
struct ServerStatus {
    #[serde(rename = "serverUp")]
    server_up: bool,
}

impl<'a> StatusMessage<'a> {
    pub fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self {
            kind: "serverStatus",
            server_status: ServerStatus {
                server_up: snapshot.connected,
            },
            library_stats: &snapshot.library_stats,
            recently_added: &snapshot.recently_added,
            network_bandwidth: &snapshot.network_bandwidth,
            active_streams: &snapshot.active_streams,
            transcoding: &snapshot.transcoding,
        }
    }
}

// ── Hub ──────────────────────────────────────────────────────────────────────

/// Fan-out hub for connected displays. Each connection task owns one
/// subscription; membership is whatever the transport keeps alive, the hub
/// itself tracks nothing.
#[derive(Clone)]
pub struct BroadcastHub {
    tx: broadcast::Sender<String>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Number of currently-attached display clients.
    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Serialize once, hand a copy to every open channel. Nobody listening
    /// is not an error.
    pub fn broadcast(&self, snapshot: &StatusSnapshot) {
        match serde_json::to_string(&StatusMessage::new(snapshot)) {
            Ok(payload) => {
                let receivers = self.client_count();
                if self.tx.send(payload).is_ok() {
                    debug!("broadcast status to {receivers} client(s)");
                }
            }
            Err(e) => warn!("failed to serialize status payload: {e}"),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

// ── Server ───────────────────────────────────────────────────────────────────

/// Accepts device connections forever. A failed bind is logged and gives
/// up; the rest of the app keeps working without a listener.
pub async fn serve(hub: BroadcastHub) {
    let addr = format!("0.0.0.0:{BROADCAST_PORT}");
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => {
            info!("broadcast server listening on {addr}");
            listener
        }
        Err(e) => {
            warn!("failed to bind broadcast port {addr}: {e}");
            return;
        }
    };

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(_) => continue,
        };

        let hub = hub.clone();
        tokio::spawn(async move {
            let ws = match tokio_tungstenite::accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    debug!("websocket handshake with {peer} failed: {e}");
                    return;
                }
            };
            info!("display client connected from {peer}");
            client_loop(ws, hub.subscribe()).await;
            info!("display client {peer} disconnected");
        });
    }
}

async fn client_loop(ws: WebSocketStream<TcpStream>, mut rx: broadcast::Receiver<String>) {
    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Ok(payload) => {
                    if sink.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                // A slow client skips ahead instead of erroring out.
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("display client lagged, skipped {skipped} updates");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(_)) => break,
                // The device sends nothing this side acts on.
                Some(Ok(_)) => {}
            },
        }
    }
}
