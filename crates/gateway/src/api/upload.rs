//! Invoice upload endpoint.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use relay_core::event::{new_invoice_id, InvoiceEvent, InvoiceStatus, StatusRecord};
use relay_storage::{blob_key, StorageError};

use crate::api::{bad_request, internal_error, payload_too_large, ApiError};
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub invoice_id: String,
    pub blob_url: String,
    pub correlation_id: String,
}

struct UploadedFile {
    file_name: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

async fn extract_file(multipart: &mut Multipart) -> Result<Option<UploadedFile>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("multipart error: {e}")))?
    {
        // Only the 'file' field matters; extra form fields are ignored.
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().map(String::from);
        let content_type = field.content_type().map(String::from);
        let data = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read file: {e}")))?;

        return Ok(Some(UploadedFile {
            file_name,
            content_type,
            data,
        }));
    }
    Ok(None)
}

pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let file = extract_file(&mut multipart).await?.ok_or_else(|| {
        bad_request("file is required (multipart/form-data with a 'file' field)")
    })?;

    if file.data.is_empty() {
        return Err(bad_request(
            "file is required (multipart/form-data with a 'file' field)",
        ));
    }
    if file.data.len() > state.max_upload_bytes {
        return Err(payload_too_large(format!(
            "file exceeds the {} MB upload limit",
            state.max_upload_bytes / (1024 * 1024)
        )));
    }

    state
        .blobs
        .ensure_container()
        .await
        .map_err(internal_error)?;

    let invoice_id = new_invoice_id();
    let key = blob_key(Utc::now(), &invoice_id, file.file_name.as_deref());
    let size = file.data.len();

    state.blobs.put_new(&key, file.data).await.map_err(|e| match e {
        // A fresh v4 id colliding means something is wrong with id generation,
        // not with the client request.
        StorageError::Conflict(path) => internal_error(format!("blob already exists: {path}")),
        other => internal_error(other),
    })?;

    let blob_url = state.blobs.url_for(&key);
    info!(invoice_id = %invoice_id, url = %blob_url, size, "Stored invoice blob");

    let event = InvoiceEvent::new(
        invoice_id.clone(),
        blob_url.clone(),
        file.file_name,
        file.content_type,
    );

    // A failed marker write only degrades the status endpoint, so it does
    // not fail the upload.
    if let Err(e) = state
        .status
        .write(&StatusRecord::new(&event, InvoiceStatus::Accepted, None))
        .await
    {
        warn!(invoice_id = %event.invoice_id, "Failed to write accepted marker: {e}");
    }

    state.publisher.publish(&event).await.map_err(internal_error)?;

    info!(
        invoice_id = %event.invoice_id,
        correlation_id = %event.correlation_id,
        "Invoice accepted"
    );

    let location = format!("/invoices/{invoice_id}");
    let body = Json(UploadResponse {
        invoice_id,
        blob_url,
        correlation_id: event.correlation_id.clone(),
    });

    Ok((StatusCode::CREATED, [(header::LOCATION, location)], body))
}
