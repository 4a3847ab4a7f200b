// Guarded WebSocket handler for the inbound deployment mode. Speaks the same
// envelope protocol as the outbound client: pushes system_stats per sample,
// answers ping, honors get_system_stats.

use axum::{
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};
use tracing::{debug, info, warn};

use super::AppState;
use crate::models::SampleRecord;
use crate::protocol::Envelope;
use crate::sampler::now_ms;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub(super) async fn ws_agent(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    if !super::authorized(addr.ip(), state.allowed_ip) {
        // Audit trail: rejections are never silent.
        warn!(source_ip = %addr.ip(), "rejected unauthorized consumer connection");
        return StatusCode::FORBIDDEN.into_response();
    }
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = stream_agent(socket, state).await {
            info!("consumer stream error: {}", e);
        }
    })
    .into_response()
}

async fn stream_agent(mut socket: WebSocket, state: AppState) -> anyhow::Result<()> {
    let mut rx = state.stats_tx.subscribe();
    // hostId is logged exactly once per connection lifetime.
    info!(host_id = %state.host_id, "consumer connected");

    let mut latest: Option<SampleRecord> = None;
    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ping_interval.tick().await;

    loop {
        tokio::select! {
            result = rx.recv() => match result {
                Ok(record) => {
                    latest = Some(record.clone());
                    let envelope = Envelope::SystemStats {
                        host_id: state.host_id.clone(),
                        payload: record,
                    };
                    if !send_envelope(&mut socket, &envelope).await {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "consumer lagged, records skipped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = ping_interval.tick() => {
                let ping = Envelope::Ping { timestamp: now_ms() };
                if !send_envelope(&mut socket, &ping).await {
                    break;
                }
            }
            msg = socket.recv() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if !dispatch(&mut socket, text.as_str(), &state.host_id, &latest).await {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "socket error");
                    break;
                }
            },
        }
    }
    Ok(())
}

/// Returns false when the socket is no longer usable.
async fn dispatch(
    socket: &mut WebSocket,
    text: &str,
    host_id: &str,
    latest: &Option<SampleRecord>,
) -> bool {
    match serde_json::from_str::<Envelope>(text) {
        Ok(Envelope::Ping { timestamp }) => {
            debug!(timestamp, "ping from consumer");
            send_envelope(socket, &Envelope::Pong { timestamp: now_ms() }).await
        }
        Ok(Envelope::GetSystemStats) => match latest {
            Some(record) => {
                let envelope = Envelope::SystemStats {
                    host_id: host_id.to_string(),
                    payload: record.clone(),
                };
                send_envelope(socket, &envelope).await
            }
            None => true,
        },
        Ok(other) => {
            debug!(?other, "unexpected envelope from consumer; ignored");
            true
        }
        Err(e) => {
            debug!(error = %e, "malformed message from consumer; ignored");
            true
        }
    }
}

async fn send_envelope(socket: &mut WebSocket, envelope: &Envelope) -> bool {
    let json = match serde_json::to_string(envelope) {
        Ok(j) => j,
        Err(e) => {
            debug!(error = %e, "envelope serialization failed");
            return true;
        }
    };
    let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(json.into()))).await;
    matches!(r, Ok(Ok(())))
}
