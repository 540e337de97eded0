//! HTTP ingestion gateway for invoice documents.
//!
//! Accepts multipart uploads, persists the document to blob storage, and
//! publishes one queue event per accepted invoice. Delivery to the partner
//! happens out of process (see `relay-worker`).

pub mod api;
pub mod router;
pub mod startup;
pub mod state;
