//! Per-invoice status markers persisted alongside the blobs.
//!
//! The gateway writes an `accepted` marker when it takes custody of a
//! document; the worker overwrites it with the delivery verdict. Markers live
//! under `{container}/status/` so both processes see the same state through
//! whichever backend is configured.

use std::sync::Arc;

use relay_core::event::StatusRecord;

use crate::error::StorageError;
use crate::store::BlobStore;

#[derive(Clone)]
pub struct StatusStore {
    blobs: Arc<BlobStore>,
}

impl StatusStore {
    pub fn new(blobs: Arc<BlobStore>) -> Self {
        Self { blobs }
    }

    fn marker_key(invoice_id: &str) -> String {
        format!("status/{invoice_id}.json")
    }

    /// Record the latest status for an invoice, replacing any earlier marker.
    pub async fn write(&self, record: &StatusRecord) -> Result<(), StorageError> {
        let json =
            serde_json::to_vec(record).map_err(|e| StorageError::Serialize(e.to_string()))?;
        self.blobs
            .put(&Self::marker_key(&record.invoice_id), json.into())
            .await
    }

    /// Look up the current status of an invoice. `None` means the id was
    /// never accepted by this deployment.
    pub async fn read(&self, invoice_id: &str) -> Result<Option<StatusRecord>, StorageError> {
        match self.blobs.get(&Self::marker_key(invoice_id)).await {
            Ok(bytes) => {
                let record = serde_json::from_slice(&bytes)
                    .map_err(|e| StorageError::Serialize(e.to_string()))?;
                Ok(Some(record))
            }
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
