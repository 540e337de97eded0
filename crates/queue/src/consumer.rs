//! Consumer side of the invoice queue.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::QueueError;

/// One delivered message, as handed to the worker.
///
/// The body is the JSON invoice event; everything else is transport metadata
/// the broker attaches. `delivery_attempt` grows with each redelivery, which
/// is the only visible trace of the at-least-once contract.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    /// Provider-assigned message identifier, stable across redeliveries.
    pub message_id: String,
    /// Raw JSON body as published by the gateway.
    pub body: String,
    /// Opaque handle the broker wants back for ack/nack.
    pub receipt: String,
    /// When the gateway published the message.
    pub sent_utc: DateTime<Utc>,
    /// 1 on first delivery, higher on each redelivery.
    pub delivery_attempt: u32,
}

/// Snapshot of queue reachability and depth, taken at worker startup.
#[derive(Debug, Clone)]
pub struct QueueHealth {
    pub connected: bool,
    pub approximate_message_count: Option<u64>,
    pub provider: String,
}

impl fmt::Display for QueueHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.approximate_message_count {
            Some(count) => write!(f, "{} connected, ~{} queued", self.provider, count),
            None => write!(f, "{} connected", self.provider),
        }
    }
}

/// Receiving end of the invoice queue.
///
/// One implementation per broker; the worker only sees this trait. Redelivery
/// of already-acked messages must not happen, but unacked messages reappear
/// after the visibility window, so the worker has to tolerate duplicates.
#[async_trait]
pub trait QueueConsumer: Send + Sync {
    /// Poll up to `max_messages`, blocking for at most the provider's
    /// long-poll window. An empty vec means the queue was idle.
    async fn poll_batch(&self, max_messages: u32) -> Result<Vec<QueueMessage>, QueueError>;

    /// Finish a message for good, whether delivered or terminally failed.
    async fn ack(&self, receipt: &str) -> Result<(), QueueError>;

    /// Hand a message back for redelivery after a transient failure.
    async fn nack(&self, receipt: &str) -> Result<(), QueueError>;

    /// Probe queue connectivity.
    async fn health_check(&self) -> Result<QueueHealth, QueueError>;
}
