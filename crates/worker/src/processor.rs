//! Per-message invoice processing.
//!
//! One invocation takes a raw queue message through the full pipeline:
//! parse, idempotency check, blob download, credential resolution, partner
//! delivery, and the status marker recording the verdict.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};

use relay_core::event::{InvoiceEvent, InvoiceStatus, StatusRecord};
use relay_queue::{parse_event, QueueMessage};
use relay_secrets::SecretResolver;
use relay_storage::{fetch_url, BlobStore, StatusStore, StorageError};

use crate::delivery::{DeliveryVerdict, PartnerClient};
use crate::error::ProcessError;

/// Successful end state of one processing invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The partner accepted the document.
    Delivered { status: u16 },
    /// A delivered marker already existed, so nothing was sent.
    Skipped,
}

pub struct InvoiceProcessor {
    blobs: Arc<BlobStore>,
    status: StatusStore,
    secrets: SecretResolver,
    partner: PartnerClient,
    token_secret_name: String,
}

impl InvoiceProcessor {
    pub fn new(
        blobs: Arc<BlobStore>,
        status: StatusStore,
        secrets: SecretResolver,
        partner: PartnerClient,
        token_secret_name: impl Into<String>,
    ) -> Self {
        Self {
            blobs,
            status,
            secrets,
            partner,
            token_secret_name: token_secret_name.into(),
        }
    }

    /// Process one queue message end to end.
    ///
    /// `Ok` means the message is done (ack). [`ProcessError::Terminal`] means
    /// it can never succeed (also ack). [`ProcessError::Transient`] asks the
    /// runner to nack so the broker redelivers.
    pub async fn process(&self, message: &QueueMessage) -> Result<ProcessOutcome, ProcessError> {
        let event = parse_event(message)
            .map_err(|e| ProcessError::Terminal(format!("poison message: {e}")))?;

        info!(
            invoice_id = %event.invoice_id,
            correlation_id = %event.correlation_id,
            attempt = message.delivery_attempt,
            "Processing invoice event"
        );

        // At-least-once delivery: a marker from an earlier attempt means the
        // partner already has this document.
        if self.already_delivered(&event.invoice_id).await {
            info!(
                invoice_id = %event.invoice_id,
                correlation_id = %event.correlation_id,
                "Already delivered, skipping"
            );
            return Ok(ProcessOutcome::Skipped);
        }

        let document = self.download(&event).await?;
        let token = self.secrets.resolve(&self.token_secret_name).await?;

        match self
            .partner
            .deliver(document, event.content_type.as_deref(), &token)
            .await?
        {
            DeliveryVerdict::Delivered { status } => {
                self.record(
                    &event,
                    InvoiceStatus::Delivered,
                    Some(format!("partner accepted with {status}")),
                )
                .await;
                info!(
                    invoice_id = %event.invoice_id,
                    correlation_id = %event.correlation_id,
                    status = status,
                    "Invoice delivered"
                );
                Ok(ProcessOutcome::Delivered { status })
            }
            DeliveryVerdict::Rejected { status, detail } => {
                let reason = if detail.is_empty() {
                    format!("partner rejected with {status}")
                } else {
                    format!("partner rejected with {status}: {detail}")
                };
                self.record(&event, InvoiceStatus::Rejected, Some(reason.clone()))
                    .await;
                Err(ProcessError::Terminal(reason))
            }
        }
    }

    async fn download(&self, event: &InvoiceEvent) -> Result<Bytes, ProcessError> {
        match self.blobs.get_url(&event.blob_url).await {
            Ok(bytes) => Ok(bytes),
            // A URL this store cannot address was minted against a different
            // storage target; fetch it directly with ambient credentials.
            Err(StorageError::InvalidUrl(_)) => Ok(fetch_url(&event.blob_url).await?),
            Err(e) => Err(e.into()),
        }
    }

    async fn already_delivered(&self, invoice_id: &str) -> bool {
        match self.status.read(invoice_id).await {
            Ok(Some(record)) => record.status == InvoiceStatus::Delivered,
            Ok(None) => false,
            Err(e) => {
                warn!(
                    invoice_id = %invoice_id,
                    error = %e,
                    "Status marker read failed, processing anyway"
                );
                false
            }
        }
    }

    // The partner call already happened by the time a verdict marker is
    // written, so a marker failure must not push the message back to the
    // queue. It only degrades the status endpoint.
    async fn record(&self, event: &InvoiceEvent, status: InvoiceStatus, detail: Option<String>) {
        let record = StatusRecord::new(event, status, detail);
        if let Err(e) = self.status.write(&record).await {
            warn!(
                invoice_id = %event.invoice_id,
                status = status.as_str(),
                error = %e,
                "Failed to write status marker"
            );
        }
    }
}
