use std::time::Duration;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::metrics;
use crate::server::AppState;

/// The hub lock must be obtainable within this long for the relay to count as ready.
const READY_CHECK_TIMEOUT: Duration = Duration::from_secs(1);

/// Health check endpoint - returns server status
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let metrics = state.metrics.snapshot();
    let history_entries = state.hub.history_len().await as u64;

    Json(metrics::HealthStatus {
        status: "healthy".to_string(),
        connections: state.hub.connection_count().await as u64,
        history_entries,
        uptime_secs: metrics.uptime_secs,
    })
}

/// Metrics endpoint - returns detailed server metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

/// Liveness check - returns 200 if the server is running
pub async fn health_live_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

/// Readiness check - returns 200 if the routing core is responsive
pub async fn health_ready_handler(State(state): State<AppState>) -> Response {
    match tokio::time::timeout(READY_CHECK_TIMEOUT, state.hub.connection_count()).await {
        Ok(connections) => Json(serde_json::json!({
            "status": "ready",
            "connections": connections,
        }))
        .into_response(),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "reason": "routing core busy",
            })),
        )
            .into_response(),
    }
}
