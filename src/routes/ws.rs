// WebSocket handler: pushes a cycle report after every completed poll cycle

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::models::CycleReport;
use crate::store::MetricsStore;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub(super) async fn ws_status(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let tx = state.cycle_tx.clone();
    let store = state.store.clone();
    ws.on_upgrade(move |socket| async move {
        let mut rx = tx.subscribe();
        if let Err(e) = stream_status(socket, &mut rx, store).await {
            tracing::info!("Status stream error: {}", e);
        }
    })
}

async fn stream_status(
    socket: WebSocket,
    rx: &mut broadcast::Receiver<CycleReport>,
    store: Arc<MetricsStore>,
) -> anyhow::Result<()> {
    tracing::info!("Client connected to status stream");
    let (mut sender, mut receiver) = socket.split();

    // Current state first, so the client does not wait up to a full interval.
    let devices = store.get_all().await;
    let welcome = serde_json::json!({
        "type": "welcome",
        "summary": crate::aggregate::summarize(&devices),
        "devices": devices,
    });
    let welcome_json = serde_json::to_string(&welcome)?;
    let r = timeout(WS_SEND_TIMEOUT, sender.send(Message::Text(welcome_json.into()))).await;
    if r.is_err() || r.unwrap_or(Ok(())).is_err() {
        return Ok(());
    }

    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ping_interval.reset();
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(report) => {
                        let json = serde_json::to_string(&report)?;
                        let r = timeout(WS_SEND_TIMEOUT, sender.send(Message::Text(json.into()))).await;
                        if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("WebSocket /ws/status client lagged, skipped {} reports", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, sender.send(Message::Ping(Bytes::new()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
        }
    }
    tracing::info!("Client disconnected from status stream");
    Ok(())
}
