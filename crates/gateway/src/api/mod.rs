//! HTTP endpoint handlers.

pub mod health;
pub mod status;
pub mod upload;

pub use health::health;
pub use status::status;
pub use upload::upload;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

// ── Error shape ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);
pub(crate) type ApiResult<T> = Result<T, ApiError>;

// ── Helpers ─────────────────────────────────────────────────────

pub(crate) fn bad_request(msg: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { error: msg.into() }),
    )
}

pub(crate) fn payload_too_large(msg: impl Into<String>) -> ApiError {
    (
        StatusCode::PAYLOAD_TOO_LARGE,
        Json(ErrorResponse { error: msg.into() }),
    )
}

pub(crate) fn not_found(msg: impl Into<String>) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse { error: msg.into() }),
    )
}

pub(crate) fn internal_error(e: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}
