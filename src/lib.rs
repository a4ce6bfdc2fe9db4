pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod storage;
pub mod telemetry;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::handlers::{docs::create_docs_router, AppState};

pub fn create_app(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/me", get(handlers::auth::me))
        .route(
            "/files",
            post(handlers::files::upload_file).get(handlers::files::list_files),
        )
        .route(
            "/files/:id",
            get(handlers::files::get_file).delete(handlers::files::delete_file),
        )
        .route("/files/:id/download", get(handlers::files::download_file))
        .route("/storage/remaining", get(handlers::storage::remaining_storage))
        .route("/storage/reconcile", post(handlers::storage::reconcile_storage));

    Router::new()
        .nest("/api", api)
        .route("/health", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        .route("/metrics", get(handlers::metrics::metrics_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::metrics_middleware,
        ))
        .merge(create_docs_router())
        .layer(DefaultBodyLimit::max(state.config.max_upload_size))
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(ConcurrencyLimitLayer::new(state.config.max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
