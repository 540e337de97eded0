//! Partner credential resolution.
//!
//! A local override (set through the environment) always beats the managed
//! store, so developers can run against a test partner without touching AWS.

pub mod error;
pub mod resolver;
pub mod secrets_manager;
pub mod source;

pub use error::SecretError;
pub use resolver::SecretResolver;
pub use secrets_manager::SecretsManagerSource;
pub use source::{EnvOverrideSource, SecretSource};
