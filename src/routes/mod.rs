// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

use crate::metrics::MetricsState;
use crate::models::MetricsSnapshot;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) snapshot_tx: broadcast::Sender<MetricsSnapshot>,
    pub(crate) metrics: Arc<Mutex<MetricsState>>,
    pub(crate) ws_connections: Arc<AtomicUsize>,
}

pub fn app(
    snapshot_tx: broadcast::Sender<MetricsSnapshot>,
    metrics: Arc<Mutex<MetricsState>>,
    ws_connections: Arc<AtomicUsize>,
) -> Router {
    let state = AppState {
        snapshot_tx,
        metrics,
        ws_connections,
    };
    Router::new()
        .route("/", get(|| async { "roamwatch: access-point metrics server" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/metrics", get(http::api_metrics_handler)) // GET /api/metrics
        .route("/ws/metrics", get(ws::ws_metrics)) // WS /ws/metrics
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
