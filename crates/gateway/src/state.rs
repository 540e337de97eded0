//! Shared application state.

use std::sync::Arc;

use relay_queue::EventPublisher;
use relay_storage::{BlobStore, StatusStore};

pub struct AppState {
    pub blobs: Arc<BlobStore>,
    pub status: StatusStore,
    pub publisher: Arc<dyn EventPublisher>,
    /// Hard cap on the uploaded document size, in bytes.
    pub max_upload_bytes: usize,
}
