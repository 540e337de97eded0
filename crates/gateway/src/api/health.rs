//! Health probe, served on `/` and `/health`.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub storage: &'static str,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "invoice-relay-gateway",
        version: env!("CARGO_PKG_VERSION"),
        storage: if state.blobs.backend().is_remote() {
            "s3"
        } else {
            "local"
        },
    })
}
