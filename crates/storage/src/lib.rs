//! Blob persistence for invoice documents.
//!
//! Wraps `object_store` so the gateway and the worker talk to the local
//! filesystem in development and S3 in production through the same interface.

pub mod backend;
pub mod error;
pub mod fetch;
pub mod status;
pub mod store;

pub use backend::{LocalBackend, S3Backend, StorageBackend};
pub use error::StorageError;
pub use fetch::fetch_url;
pub use status::StatusStore;
pub use store::{blob_key, BlobStore};
