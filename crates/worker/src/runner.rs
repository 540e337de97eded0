//! Long-running poll loop draining the invoice queue.
//!
//! Polls a batch, hands each message to the [`InvoiceProcessor`], and turns
//! the classification into an ack or nack. Poll failures back off
//! exponentially; too many in a row stop the worker so the supervisor can
//! restart it against healthy infrastructure.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use relay_queue::{QueueConsumer, QueueError, QueueMessage};

use crate::error::ProcessError;
use crate::processor::{InvoiceProcessor, ProcessOutcome};

/// Sleep between polls when the queue comes back empty.
const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Stop the worker after this many poll failures in a row.
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Drain the queue until the process is stopped or polling fails repeatedly.
pub async fn run(
    consumer: Arc<dyn QueueConsumer>,
    processor: InvoiceProcessor,
    batch_size: u32,
) -> Result<(), QueueError> {
    match consumer.health_check().await {
        Ok(health) => info!(%health, batch_size = batch_size, "Worker connected to queue"),
        Err(e) => warn!(error = %e, "Queue health check failed, polling anyway"),
    }

    let mut total_received: u64 = 0;
    let mut total_delivered: u64 = 0;
    let mut total_rejected: u64 = 0;
    let mut consecutive_errors: u32 = 0;

    loop {
        let messages = match consumer.poll_batch(batch_size).await {
            Ok(msgs) => {
                consecutive_errors = 0;
                msgs
            }
            Err(e) => {
                consecutive_errors += 1;
                warn!(
                    error = %e,
                    consecutive_errors = consecutive_errors,
                    "Queue poll failed"
                );

                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    error!(
                        "Worker stopping after {} consecutive poll errors",
                        MAX_CONSECUTIVE_ERRORS
                    );
                    return Err(QueueError::Connection(format!(
                        "{MAX_CONSECUTIVE_ERRORS} consecutive poll errors, last: {e}"
                    )));
                }

                // Exponential backoff on errors (capped at 30s).
                let backoff = IDLE_POLL_INTERVAL * 2u32.pow(consecutive_errors.min(5));
                tokio::time::sleep(backoff.min(Duration::from_secs(30))).await;
                continue;
            }
        };

        if messages.is_empty() {
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
            continue;
        }

        total_received += messages.len() as u64;

        for message in &messages {
            match processor.process(message).await {
                Ok(outcome) => {
                    if matches!(outcome, ProcessOutcome::Delivered { .. }) {
                        total_delivered += 1;
                    }
                    ack(consumer.as_ref(), message).await;
                }
                Err(ProcessError::Terminal(reason)) => {
                    warn!(
                        message_id = %message.message_id,
                        reason = %reason,
                        "Message failed terminally, removing from queue"
                    );
                    total_rejected += 1;
                    ack(consumer.as_ref(), message).await;
                }
                Err(ProcessError::Transient(reason)) => {
                    warn!(
                        message_id = %message.message_id,
                        attempt = message.delivery_attempt,
                        reason = %reason,
                        "Transient failure, returning message to queue"
                    );
                    if let Err(e) = consumer.nack(&message.receipt).await {
                        warn!(message_id = %message.message_id, error = %e, "Failed to nack message");
                    }
                }
            }
        }

        info!(
            batch = messages.len(),
            total_received = total_received,
            total_delivered = total_delivered,
            total_rejected = total_rejected,
            "Processed queue batch"
        );

        // Brief yield to avoid busy-spinning when the queue is full.
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn ack(consumer: &dyn QueueConsumer, message: &QueueMessage) {
    if let Err(e) = consumer.ack(&message.receipt).await {
        warn!(message_id = %message.message_id, error = %e, "Failed to ack message");
    }
}
