//! Secret source trait.

use async_trait::async_trait;

use crate::error::SecretError;

/// A single place a secret can come from.
///
/// Sources are consulted in order by the resolver; `Ok(None)` means this
/// source does not hold the secret and the next one should be asked.
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Short source name for logs (e.g., "env-override").
    fn name(&self) -> &'static str;

    /// Try to resolve the named secret.
    async fn resolve(&self, name: &str) -> Result<Option<String>, SecretError>;
}

/// Local override taken from the process environment at startup.
///
/// Holds a fixed value rather than the variable name: the config layer reads
/// the environment once, so the override cannot drift while the process runs.
pub struct EnvOverrideSource {
    value: Option<String>,
}

impl EnvOverrideSource {
    /// Blank or whitespace-only overrides count as absent.
    pub fn new(value: Option<String>) -> Self {
        let value = value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);
        Self { value }
    }
}

#[async_trait]
impl SecretSource for EnvOverrideSource {
    fn name(&self) -> &'static str {
        "env-override"
    }

    async fn resolve(&self, _name: &str) -> Result<Option<String>, SecretError> {
        Ok(self.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn override_resolves_to_its_value() {
        let source = EnvOverrideSource::new(Some("token-123".to_string()));
        assert_eq!(
            source.resolve("partner-api-token").await.unwrap(),
            Some("token-123".to_string())
        );
    }

    #[tokio::test]
    async fn blank_override_is_absent() {
        let source = EnvOverrideSource::new(Some("   ".to_string()));
        assert_eq!(source.resolve("partner-api-token").await.unwrap(), None);

        let source = EnvOverrideSource::new(None);
        assert_eq!(source.resolve("partner-api-token").await.unwrap(), None);
    }
}
