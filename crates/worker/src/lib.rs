//! Processing worker for accepted invoice documents.
//!
//! Consumes the events the gateway publishes, downloads each document from
//! blob storage, resolves the partner credential, and forwards the document
//! to the partner endpoint. Transient failures are returned to the queue for
//! redelivery; terminal ones are recorded and dropped.

pub mod delivery;
pub mod error;
pub mod processor;
pub mod runner;

pub use delivery::{DeliveryVerdict, PartnerClient};
pub use error::ProcessError;
pub use processor::{InvoiceProcessor, ProcessOutcome};
