// WebSocket handler: snapshot push + inbound reset commands

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::metrics::MetricsState;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Decrements the connection count on drop (connect = +1, drop = -1).
struct WsGuard(Arc<AtomicUsize>);

impl Drop for WsGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
    }
}

pub(super) async fn ws_metrics(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let tx = state.snapshot_tx.clone();
    let metrics = state.metrics.clone();
    let conn_count = state.ws_connections.clone();
    ws.on_upgrade(move |socket| async move {
        let mut rx = tx.subscribe();
        if let Err(e) = stream_metrics(socket, &mut rx, metrics, conn_count).await {
            tracing::info!("Metrics stream error: {}", e);
        }
    })
}

/// Per-subscriber loop: forward broadcast snapshots, answer nothing on
/// inbound frames except applying decoded commands, ping on an interval.
/// Returning (on send failure or disconnect) is what removes the subscriber;
/// every connection runs its own copy of this loop, so one broken socket
/// never stalls the others.
async fn stream_metrics(
    socket: WebSocket,
    rx: &mut broadcast::Receiver<crate::models::MetricsSnapshot>,
    metrics: Arc<Mutex<MetricsState>>,
    conn_count: Arc<AtomicUsize>,
) -> anyhow::Result<()> {
    conn_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let _guard = WsGuard(conn_count);
    tracing::info!("Client connected to metrics stream");

    let (mut sender, mut receiver) = socket.split();

    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(snapshot) => {
                        let json = serde_json::to_string(&snapshot)?;
                        if !send_with_timeout(&mut sender, Message::Text(json.into())).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("WebSocket /ws/metrics client lagged, skipped {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => handle_inbound(&metrics, text.as_str()),
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = ping_interval.tick() => {
                if !send_with_timeout(&mut sender, Message::Ping(Bytes::new())).await {
                    break;
                }
            }
        }
    }
    tracing::info!("Metrics stream client disconnected");
    Ok(())
}

async fn send_with_timeout(sender: &mut SplitSink<WebSocket, Message>, msg: Message) -> bool {
    let r = timeout(WS_SEND_TIMEOUT, sender.send(msg)).await;
    !(r.is_err() || r.unwrap_or(Ok(())).is_err())
}

/// Decodes an inbound frame as a command. Only reset is understood; anything
/// else is logged and dropped without touching the connection.
fn handle_inbound(metrics: &Mutex<MetricsState>, raw: &str) {
    match serde_json::from_str::<crate::models::ClientCommand>(raw) {
        Ok(crate::models::ClientCommand::Reset) => match metrics.lock() {
            Ok(mut state) => {
                state.reset();
                tracing::info!(operation = "reset", "reset command received; metrics reset");
            }
            Err(e) => tracing::warn!(error = %e, "metrics lock poisoned"),
        },
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unrecognized inbound message");
        }
    }
}
