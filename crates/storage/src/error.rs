use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blob already exists at {0}")]
    Conflict(String),

    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("invalid blob URL: {0}")]
    InvalidUrl(String),

    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("serialization error: {0}")]
    Serialize(String),
}

impl StorageError {
    /// True for errors that indicate a missing blob rather than a failing store.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}
