//! Event publisher trait.

use async_trait::async_trait;

use relay_core::event::InvoiceEvent;

use crate::error::QueueError;

/// Trait for queue publisher backends.
///
/// The gateway publishes exactly one event per accepted upload. An error from
/// [`EventPublisher::publish`] means the event may not be queued and the
/// upload must be failed, even though the blob already exists.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an invoice event. Returns once the provider has accepted it.
    async fn publish(&self, event: &InvoiceEvent) -> Result<(), QueueError>;
}
