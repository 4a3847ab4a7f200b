// GET handlers: healthz, version

use axum::response::IntoResponse;

use crate::version::{NAME, VERSION};

/// GET /healthz: unauthenticated liveness check, exempt from the access guard.
pub(super) async fn healthz_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

/// GET /version: service name and version from Cargo.toml at build time.
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}
