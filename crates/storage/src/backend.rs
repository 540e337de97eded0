use std::path::PathBuf;
use std::sync::Arc;

use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::ObjectStore;
use tracing::info;

use relay_core::config::AwsConfig;

use crate::error::StorageError;

/// The two places invoice blobs can live: a directory during development, an
/// S3 bucket in production. Selected once at startup from config.
pub enum StorageBackend {
    Local(LocalBackend),
    S3(S3Backend),
}

impl StorageBackend {
    pub fn store(&self) -> &dyn ObjectStore {
        match self {
            StorageBackend::Local(b) => b.store.as_ref(),
            StorageBackend::S3(b) => b.store.as_ref(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, StorageBackend::S3(_))
    }
}

/// Development backend rooted at a local directory.
pub struct LocalBackend {
    pub store: Arc<dyn ObjectStore>,
    /// Absolute root; blob URLs are rendered against this path.
    pub data_dir: PathBuf,
}

impl LocalBackend {
    pub fn new(data_dir: &std::path::Path) -> Result<Self, StorageError> {
        let canonical = std::fs::canonicalize(data_dir).unwrap_or_else(|_| data_dir.to_path_buf());
        let store = LocalFileSystem::new_with_prefix(&canonical)?;
        info!("Blob storage: local backend at {}", canonical.display());
        Ok(Self {
            store: Arc::new(store),
            data_dir: canonical,
        })
    }
}

/// Production backend on S3 (or an S3-compatible endpoint such as MinIO).
///
/// Bucket, region and endpoint are kept alongside the store handle because
/// blob URL rendering and resolution need them after construction.
#[derive(Debug)]
pub struct S3Backend {
    pub store: Arc<dyn ObjectStore>,
    pub bucket: String,
    pub region: String,
    /// Normalized custom endpoint; `None` means real AWS S3.
    pub endpoint: Option<String>,
}

impl S3Backend {
    pub fn new(aws: &AwsConfig) -> Result<Self, StorageError> {
        let bucket = aws
            .s3_bucket
            .as_deref()
            .ok_or_else(|| StorageError::NotConfigured("S3_BUCKET not set".into()))?;

        let endpoint = aws
            .endpoint_url
            .as_deref()
            .filter(|e| !e.is_empty())
            .map(normalize_endpoint);

        let mut builder = AmazonS3Builder::new()
            .with_region(&aws.region)
            .with_bucket_name(bucket);

        if let Some(ref key) = aws.access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(ref secret) = aws.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }
        if let Some(ref token) = aws.session_token {
            builder = builder.with_token(token);
        }
        if let Some(ref url) = endpoint {
            builder = builder
                .with_endpoint(url)
                .with_allow_http(url.starts_with("http://"));
        }

        let store = builder.build()?;

        info!(
            "Blob storage: S3 backend s3://{} (region: {}, endpoint: {})",
            bucket,
            aws.region,
            endpoint.as_deref().unwrap_or("aws")
        );

        Ok(Self {
            store: Arc::new(store),
            bucket: bucket.to_string(),
            region: aws.region.clone(),
            endpoint,
        })
    }
}

// object_store wants absolute endpoint URLs; bare host:port means https.
fn normalize_endpoint(endpoint: &str) -> String {
    let with_scheme = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}")
    };
    with_scheme.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aws_config(bucket: Option<&str>, endpoint: Option<&str>) -> AwsConfig {
        AwsConfig {
            region: "us-east-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            s3_bucket: bucket.map(String::from),
            endpoint_url: endpoint.map(String::from),
        }
    }

    #[test]
    fn local_backend_creates() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(tmp.path()).unwrap();
        assert!(!StorageBackend::Local(backend).is_remote());
    }

    #[test]
    fn s3_backend_requires_bucket() {
        let err = S3Backend::new(&aws_config(None, None)).unwrap_err();
        assert!(matches!(err, StorageError::NotConfigured(_)));
    }

    #[test]
    fn s3_backend_normalizes_endpoint_scheme() {
        let backend = S3Backend::new(&aws_config(Some("uploads"), Some("minio:9000"))).unwrap();
        assert_eq!(backend.endpoint.as_deref(), Some("https://minio:9000"));

        let backend =
            S3Backend::new(&aws_config(Some("uploads"), Some("http://localhost:9000/"))).unwrap();
        assert_eq!(backend.endpoint.as_deref(), Some("http://localhost:9000"));
    }
}
