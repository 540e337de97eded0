//! Message body parsing.

use relay_core::event::InvoiceEvent;

use crate::consumer::QueueMessage;
use crate::error::QueueError;

/// Parse an invoice event out of a queue message body.
pub fn parse_event(message: &QueueMessage) -> Result<InvoiceEvent, QueueError> {
    serde_json::from_str(&message.body)
        .map_err(|e| QueueError::Parse(format!("message {}: {e}", message.message_id)))
}
