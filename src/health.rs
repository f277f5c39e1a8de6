//! HTTP health surface for the scheduled service.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::Utc;
use serde_json::json;
use tracing::warn;

use crate::scheduler::SharedStats;

pub const SERVICE_NAME: &str = "mail-verdict";

/// `GET /health` and `GET /status`.
pub fn health_routes(stats: SharedStats) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .with_state(stats)
}

async fn health(State(stats): State<SharedStats>) -> impl IntoResponse {
    let snapshot = stats.read().await.health_snapshot(Utc::now());
    if snapshot.healthy {
        (StatusCode::OK, Json(snapshot))
    } else {
        warn!(
            runs = snapshot.runs,
            last_error = ?snapshot.last_error,
            "Health check failed"
        );
        (StatusCode::SERVICE_UNAVAILABLE, Json(snapshot))
    }
}

async fn status() -> impl IntoResponse {
    Json(json!({ "service": SERVICE_NAME, "status": "running" }))
}
