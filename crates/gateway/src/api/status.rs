//! Invoice status endpoint.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use relay_core::event::{is_valid_invoice_id, StatusRecord};

use crate::api::{internal_error, not_found, ApiResult};
use crate::state::AppState;

pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusRecord>> {
    // Ids that cannot have been issued here are indistinguishable from
    // unknown ones.
    if !is_valid_invoice_id(&id) {
        return Err(not_found(format!("invoice not found: {id}")));
    }

    match state.status.read(&id).await.map_err(internal_error)? {
        Some(record) => Ok(Json(record)),
        None => Err(not_found(format!("invoice not found: {id}"))),
    }
}
