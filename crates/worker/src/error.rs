//! Processing error classification.

use thiserror::Error;

use relay_secrets::SecretError;
use relay_storage::StorageError;

/// Why a message could not be processed, split by what the runner should do
/// about it.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The message can never succeed. Ack it so the queue stops redelivering.
    #[error("terminal: {0}")]
    Terminal(String),

    /// The failure may clear up on its own. Nack so the broker redelivers.
    #[error("transient: {0}")]
    Transient(String),
}

impl ProcessError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessError::Terminal(_))
    }
}

// Blob reads fail transiently: a missing object can be replication lag, and
// auth or connectivity problems are operator-fixable.
impl From<StorageError> for ProcessError {
    fn from(e: StorageError) -> Self {
        ProcessError::Transient(format!("blob download failed: {e}"))
    }
}

// Credential misses are configuration errors. The message itself is fine, so
// it goes back to the queue until an operator fixes the deployment.
impl From<SecretError> for ProcessError {
    fn from(e: SecretError) -> Self {
        ProcessError::Transient(format!("credential resolution failed: {e}"))
    }
}
