// GET handlers: version, api/metrics

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use super::AppState;
use crate::version::{NAME, VERSION};

/// GET /version — returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/metrics — current snapshot on demand, without subscribing to the
/// push channel.
pub(super) async fn api_metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.lock() {
        Ok(metrics) => axum::Json(metrics.snapshot()).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "metrics lock poisoned");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
