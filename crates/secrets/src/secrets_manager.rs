//! AWS Secrets Manager source.

use async_trait::async_trait;
use aws_sdk_secretsmanager::config::BehaviorVersion;
use aws_sdk_secretsmanager::Client;
use tracing::info;

use relay_core::config::AwsConfig;

use crate::error::SecretError;
use crate::source::SecretSource;

/// Managed secret store reached with ambient credentials.
///
/// No static keys are wired in here: the default provider chain picks up the
/// task role, instance profile, or exported session, which is the whole point
/// of keeping partner tokens out of the deployment config.
pub struct SecretsManagerSource {
    client: Client,
}

impl SecretsManagerSource {
    pub async fn new(aws: &AwsConfig) -> Result<Self, SecretError> {
        let region = aws_sdk_secretsmanager::config::Region::new(aws.region.clone());
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region);

        if let Some(endpoint) = aws.endpoint_url.as_deref().filter(|e| !e.is_empty()) {
            let url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
                endpoint.to_string()
            } else {
                format!("https://{endpoint}")
            };
            loader = loader.endpoint_url(url);
        }

        let shared = loader.load().await;

        info!(region = %aws.region, "Secrets Manager source initialized");

        Ok(Self {
            client: Client::new(&shared),
        })
    }
}

#[async_trait]
impl SecretSource for SecretsManagerSource {
    fn name(&self) -> &'static str {
        "secrets-manager"
    }

    async fn resolve(&self, name: &str) -> Result<Option<String>, SecretError> {
        match self
            .client
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
        {
            Ok(resp) => Ok(resp
                .secret_string()
                .map(str::to_string)
                .filter(|s| !s.is_empty())),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_resource_not_found_exception() {
                    Ok(None)
                } else {
                    Err(SecretError::Provider(format!(
                        "get-secret-value for {name} failed: {service_err:?}"
                    )))
                }
            }
        }
    }
}
