use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};

use crate::{errors::ErrorKind, handlers::AppState};

pub async fn metrics_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    // Route templates keep label cardinality bounded.
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let _timer = state.metrics.start_timer(&format!("{} {}", method, route));

    let response = next.run(request).await;

    let status = response.status();
    if let Some(ErrorKind(kind)) = response.extensions().get::<ErrorKind>() {
        state.metrics.record_error(kind);
    } else if status.is_server_error() {
        state.metrics.record_error("server_error");
    } else if status.is_client_error() {
        state.metrics.record_error("client_error");
    }

    response
}
