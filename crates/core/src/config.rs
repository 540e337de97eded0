use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_required(key: &str) -> Result<String, ConfigError> {
    env_opt(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn env_u16(key: &str, default: u16) -> Result<u16, ConfigError> {
    parse_env(key, default)
}

fn env_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    parse_env(key, default)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env_opt(key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

// ── Top-level config ──────────────────────────────────────────

/// Process configuration shared by the gateway and the worker.
///
/// Every network target the pipeline touches is named here; missing required
/// settings fail `from_env` so binaries abort before serving traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub aws: AwsConfig,
    pub queue: QueueConfig,
    pub partner: PartnerConfig,
}

impl RelayConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            aws: AwsConfig::from_env(),
            queue: QueueConfig::from_env()?,
            partner: PartnerConfig::from_env()?,
        })
    }

    /// Print a redacted summary for startup logs. Secret values never appear.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  server:   {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  storage:  container={}, backend={}",
            self.storage.container,
            if self.aws.s3_bucket.is_some() { "s3" } else { "local" },
        );
        tracing::info!(
            "  aws:      region={}, bucket={}",
            self.aws.region,
            self.aws.s3_bucket.as_deref().unwrap_or("(none)"),
        );
        tracing::info!("  queue:    url={}", self.queue.queue_url);
        tracing::info!(
            "  partner:  endpoint={}, token_override={}, secret={}",
            self.partner.endpoint,
            if self.partner.token_override.is_some() { "set" } else { "(none)" },
            self.partner.token_secret_name,
        );
    }
}

// ── Gateway server ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_or("GATEWAY_HOST", "0.0.0.0"),
            port: env_u16("GATEWAY_PORT", 8080)?,
        })
    }
}

// ── Blob storage ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for the local backend.
    pub data_dir: PathBuf,
    /// Logical container name, the first segment of every blob key.
    pub container: String,
    /// Upload size cap enforced by the gateway, in mebibytes.
    pub max_upload_mb: u64,
}

impl StorageConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            data_dir: PathBuf::from(env_or("RELAY_DATA_DIR", "data")),
            container: env_or("RELAY_CONTAINER", "invoices"),
            max_upload_mb: env_u64("MAX_UPLOAD_MB", 100)?,
        })
    }
}

// ── AWS / S3 ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    /// Presence selects the S3 backend; absent means local filesystem.
    pub s3_bucket: Option<String>,
    pub endpoint_url: Option<String>,
}

impl AwsConfig {
    fn from_env() -> Self {
        Self {
            region: env_or("AWS_REGION", "us-east-1"),
            access_key_id: env_opt("AWS_ACCESS_KEY_ID"),
            secret_access_key: env_opt("AWS_SECRET_ACCESS_KEY"),
            session_token: env_opt("AWS_SESSION_TOKEN"),
            s3_bucket: env_opt("S3_BUCKET"),
            endpoint_url: env_opt("AWS_ENDPOINT_URL"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.s3_bucket.is_some()
    }
}

// ── Queue ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub queue_url: String,
    pub visibility_timeout_secs: u64,
}

impl QueueConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            queue_url: env_required("QUEUE_URL")?,
            visibility_timeout_secs: env_u64("QUEUE_VISIBILITY_TIMEOUT_SECS", 120)?,
        })
    }

    /// SQS FIFO queues require deduplication ids; standard queues reject them.
    pub fn is_fifo(&self) -> bool {
        self.queue_url.ends_with(".fifo")
    }
}

// ── Partner delivery ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerConfig {
    /// Downstream delivery endpoint. The default is the demo sink the
    /// pipeline was first pointed at; real deployments override it.
    pub endpoint: String,
    /// Local token override, consulted before the managed store.
    pub token_override: Option<String>,
    /// Secrets Manager secret name, consulted when no override is set.
    pub token_secret_name: String,
    pub delivery_timeout_secs: u64,
}

impl PartnerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: env_or("PARTNER_ENDPOINT", "https://httpbin.org/post"),
            token_override: env_opt("PARTNER_API_TOKEN"),
            token_secret_name: env_or("PARTNER_TOKEN_SECRET_NAME", "partner-api-token"),
            delivery_timeout_secs: env_u64("DELIVERY_TIMEOUT_SECS", 30)?,
        })
    }
}
