//! Liveness and readiness probes.
//!
//! - `/health`: the process is up
//! - `/ready`: the renewal store answers a ping

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness probe. Checks no dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe.
///
/// Returns 200 when the renewal store is reachable, 503 otherwise. Without
/// the store no session can be opened or rotated.
///
/// The store error is logged server-side only.
#[tracing::instrument(skip_all, name = "session.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if let Err(e) = state.tokens.check_store().await {
        tracing::warn!(target: "session.health", error = %e, "Readiness check failed: renewal store unavailable");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready",
                store: "unavailable",
                error: Some("Service dependencies unavailable"),
            }),
        );
    }

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: "ready",
            store: "available",
            error: None,
        }),
    )
}
