use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Attribution placeholder carried on every event until real caller identity
/// is wired through the gateway.
pub const UPLOADED_BY: &str = "local-dev";

/// Generate a fresh invoice identifier: 32 lowercase hex chars, no hyphens.
pub fn new_invoice_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Check that an identifier has the shape produced by [`new_invoice_id`].
pub fn is_valid_invoice_id(id: &str) -> bool {
    id.len() == 32 && id.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

/// The queue payload and unit of work handed from the gateway to the worker.
///
/// `invoice_id` and `blob_url` are only ever set together through
/// [`InvoiceEvent::new`]; once published the event is immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceEvent {
    /// Globally unique identifier, also the transport-level message identity.
    pub invoice_id: String,
    /// Fully-qualified locator of the stored document.
    pub blob_url: String,
    pub original_file_name: Option<String>,
    pub content_type: Option<String>,
    pub uploaded_by: String,
    /// Trace key propagated through logging and the outbound call.
    pub correlation_id: String,
    pub received_utc: DateTime<Utc>,
}

impl InvoiceEvent {
    /// Build the event for a freshly stored blob, stamping a new correlation
    /// id and the current UTC time.
    pub fn new(
        invoice_id: String,
        blob_url: String,
        original_file_name: Option<String>,
        content_type: Option<String>,
    ) -> Self {
        Self {
            invoice_id,
            blob_url,
            original_file_name,
            content_type,
            uploaded_by: UPLOADED_BY.to_string(),
            correlation_id: Uuid::new_v4().to_string(),
            received_utc: Utc::now(),
        }
    }
}

/// Lifecycle state of an invoice as seen by the pipeline.
///
/// `Accepted` is set by the gateway at ingestion; the worker advances it to
/// `Delivered` after a successful partner call or `Rejected` after a terminal
/// partner rejection. Transient failures leave the status at `Accepted`
/// until the broker redelivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Accepted,
    Delivered,
    Rejected,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Accepted => "accepted",
            InvoiceStatus::Delivered => "delivered",
            InvoiceStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable status marker, stored as a small JSON object next to the invoice
/// blobs so the gateway and the worker both see it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub invoice_id: String,
    pub status: InvoiceStatus,
    pub correlation_id: String,
    pub updated_utc: DateTime<Utc>,
    /// Human-readable context for terminal states (e.g. the rejecting status code).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StatusRecord {
    pub fn new(event: &InvoiceEvent, status: InvoiceStatus, detail: Option<String>) -> Self {
        Self {
            invoice_id: event.invoice_id.clone(),
            status,
            correlation_id: event.correlation_id.clone(),
            updated_utc: Utc::now(),
            detail,
        }
    }
}
