use axum::{extract::State, response::Json};

use crate::{
    errors::Result,
    handlers::AppState,
    middleware::AuthenticatedUser,
    models::{ReconcileResponse, StorageResponse},
};

#[utoipa::path(
    get,
    path = "/api/storage/remaining",
    tag = "storage",
    responses(
        (status = 200, description = "Storage limit, usage and remaining space", body = StorageResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn remaining_storage(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<StorageResponse>> {
    let summary = state.files.storage_summary(auth.id).await?;
    let formatter = state.formatter();

    Ok(Json(StorageResponse {
        total_storage: formatter.format(summary.total),
        storage_used: formatter.format(summary.used),
        remaining_storage: formatter.format(summary.remaining()),
        unit: formatter.unit().to_string(),
    }))
}

/// Recompute usage from the caller's live files.
#[utoipa::path(
    post,
    path = "/api/storage/reconcile",
    tag = "storage",
    responses(
        (status = 200, description = "Usage before and after reconciling", body = ReconcileResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn reconcile_storage(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<ReconcileResponse>> {
    let report = state.files.reconcile(auth.id).await?;
    let formatter = state.formatter();

    Ok(Json(ReconcileResponse {
        previous_storage_used: formatter.format(report.previous),
        storage_used: formatter.format(report.current),
        unit: formatter.unit().to_string(),
    }))
}
