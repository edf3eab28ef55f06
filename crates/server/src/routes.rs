//! Route configuration.

use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.server.max_upload_bytes_usize();

    let api_routes = Router::new()
        // Health check (storage reachable)
        .route("/v1/health", get(handlers::health_check))
        // Upload controller state and idle time
        .route("/v1/status", get(handlers::get_status));

    // The file explorer posts multipart uploads here, with the target
    // folder in the `path` query parameter.
    let upload_routes = Router::new()
        .route("/explorer", post(handlers::upload_file))
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .merge(api_routes)
        .merge(upload_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
