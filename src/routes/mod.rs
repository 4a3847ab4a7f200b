// Inbound deployment mode: HTTP health surface + source-IP-guarded WebSocket

mod http;
mod ws;

use std::net::IpAddr;

use axum::{Router, routing::get};
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

use crate::models::SampleRecord;

/// Access guard: a connection is authorized iff the remote IP exactly matches
/// the single configured consumer address.
pub fn authorized(remote: IpAddr, allowed: IpAddr) -> bool {
    remote == allowed
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) stats_tx: broadcast::Sender<SampleRecord>,
    pub(crate) host_id: String,
    pub(crate) allowed_ip: IpAddr,
}

pub fn app(
    stats_tx: broadcast::Sender<SampleRecord>,
    host_id: String,
    allowed_ip: IpAddr,
) -> Router {
    let state = AppState {
        stats_tx,
        host_id,
        allowed_ip,
    };
    Router::new()
        .route("/healthz", get(http::healthz_handler)) // liveness, guard-exempt
        .route("/version", get(http::version_handler)) // GET /version
        .route("/ws", get(ws::ws_agent)) // WS /ws (guarded)
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
