use crate::services::get_metrics;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Media generation service",
        "service": "media-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "media-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Ready once the local media directory is reachable, since every request
/// may need to fall back to it.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match tokio::fs::metadata(&state.config.storage.local_path).await {
        Ok(meta) if meta.is_dir() => StatusCode::OK,
        Ok(_) => StatusCode::SERVICE_UNAVAILABLE,
        Err(e) => {
            tracing::warn!(error = %e, "Local media directory unavailable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
