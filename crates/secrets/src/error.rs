//! Secret resolution error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("secret provider error: {0}")]
    Provider(String),
}
