//! Ordered secret resolution.

use tracing::debug;

use relay_core::config::RelayConfig;

use crate::error::SecretError;
use crate::secrets_manager::SecretsManagerSource;
use crate::source::{EnvOverrideSource, SecretSource};

/// Resolves secrets by asking each source in order and taking the first hit.
pub struct SecretResolver {
    sources: Vec<Box<dyn SecretSource>>,
}

impl SecretResolver {
    pub fn new(sources: Vec<Box<dyn SecretSource>>) -> Self {
        Self { sources }
    }

    /// Standard chain for partner credentials: local override first, managed
    /// store second.
    pub async fn from_config(config: &RelayConfig) -> Result<Self, SecretError> {
        Ok(Self::new(vec![
            Box::new(EnvOverrideSource::new(config.partner.token_override.clone())),
            Box::new(SecretsManagerSource::new(&config.aws).await?),
        ]))
    }

    /// Resolve the named secret, or fail with [`SecretError::NotFound`] once
    /// every source has come up empty.
    pub async fn resolve(&self, name: &str) -> Result<String, SecretError> {
        for source in &self.sources {
            if let Some(value) = source.resolve(name).await? {
                debug!(source = source.name(), secret = name, "Secret resolved");
                return Ok(value);
            }
        }
        Err(SecretError::NotFound(name.to_string()))
    }
}
