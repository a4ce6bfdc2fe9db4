use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::json;

use crate::{database::bounded, handlers::AppState};

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Process is up"))
)]
pub async fn liveness() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Metadata store reachable"),
        (status = 503, description = "Metadata store unavailable")
    )
)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let store_status = match bounded(state.config.store_timeout(), state.store.ping()).await {
        Ok(()) => "healthy",
        Err(e) => {
            tracing::warn!("Readiness check failed: {}", e);
            "unhealthy"
        }
    };

    let (status, overall) = if store_status == "healthy" {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    (
        status,
        Json(json!({
            "status": overall,
            "checks": {
                "metadata_store": store_status
            },
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}
