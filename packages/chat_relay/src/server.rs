use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::{Router, routing::get};
use relay_core::{IdGenerator, RelayHub};
use socketioxide::SocketIo;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{MakeSpan, TraceLayer};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::handlers;
use crate::metrics::ServerMetrics;
use crate::ws;

/// Hardening headers added to every response that does not already set them.
pub const SECURITY_HEADERS: [(&str, &str); 7] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "SAMEORIGIN"),
    ("referrer-policy", "no-referrer"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<RelayHub>,
    pub metrics: Arc<ServerMetrics>,
    pub config: Arc<RelayConfig>,
}

impl AppState {
    pub fn new(config: RelayConfig, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            hub: Arc::new(RelayHub::new(config.hub.clone(), ids)),
            metrics: Arc::new(ServerMetrics::new()),
            config: Arc::new(config),
        }
    }
}

/// Custom MakeSpan that includes a unique request ID for log correlation
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

pub fn router(state: AppState) -> Router {
    let (socketio_layer, io) = SocketIo::new_layer();
    ws::register_socketio(&io, state.clone());

    let mut router = Router::new()
        .route("/", get(handlers::raw_websocket_handler))
        .route("/ws", get(handlers::raw_websocket_handler))
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/health/ready", get(handlers::health_ready_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(state)
        .layer(socketio_layer);

    for (name, value) in SECURITY_HEADERS {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ));
    }

    router
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
}
