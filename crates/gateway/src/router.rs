//! HTTP router construction.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api;
use crate::state::AppState;

/// Build the application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Leave headroom above the document cap for multipart framing, so the
    // size check in the handler decides the verdict, not the body limit.
    let body_limit = state.max_upload_bytes + 64 * 1024;

    Router::new()
        .route("/", get(api::health))
        .route("/health", get(api::health))
        .route("/invoices", post(api::upload))
        .route("/invoices/{id}", get(api::status))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
