use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use object_store::PutMode;
use url::Url;

use relay_core::config::RelayConfig;

use crate::backend::{LocalBackend, S3Backend, StorageBackend};
use crate::error::StorageError;

/// Derive the date-partitioned blob key for an invoice document.
///
/// Keys look like `2024/03/05/a1b2c3...d4.pdf`: the receive date keeps
/// listings browsable, the invoice id makes the key unique, and the original
/// file extension is kept so downstream viewers can open the blob.
pub fn blob_key(received: DateTime<Utc>, invoice_id: &str, original_file_name: Option<&str>) -> String {
    let extension = original_file_name.map(file_extension).unwrap_or_default();
    format!("{}/{}{}", received.format("%Y/%m/%d"), invoice_id, extension)
}

fn file_extension(name: &str) -> String {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

/// Container-scoped blob store over the configured backend.
///
/// All keys are relative to the container, so `2024/03/05/abc.pdf` lands at
/// `{data_dir}/{container}/2024/03/05/abc.pdf` locally and
/// `s3://{bucket}/{container}/2024/03/05/abc.pdf` on S3.
pub struct BlobStore {
    backend: StorageBackend,
    container: String,
}

impl BlobStore {
    pub fn new(backend: StorageBackend, container: impl Into<String>) -> Self {
        Self {
            backend,
            container: container.into(),
        }
    }

    /// Create a BlobStore from config. Selects local or S3 based on AwsConfig.
    pub fn from_config(config: &RelayConfig) -> Result<Self, StorageError> {
        let backend = if config.aws.is_configured() {
            StorageBackend::S3(S3Backend::new(&config.aws)?)
        } else {
            // Ensure data dir exists for local backend
            std::fs::create_dir_all(&config.storage.data_dir).ok();
            StorageBackend::Local(LocalBackend::new(&config.storage.data_dir)?)
        };

        Ok(Self::new(backend, config.storage.container.clone()))
    }

    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    /// Make sure the container is usable before the first write.
    ///
    /// Locally this creates the directory. S3 buckets are provisioned outside
    /// the application, so a one-object listing probes that the bucket exists
    /// and the credentials can reach it.
    pub async fn ensure_container(&self) -> Result<(), StorageError> {
        match &self.backend {
            StorageBackend::Local(local) => {
                tokio::fs::create_dir_all(local.data_dir.join(&self.container)).await?;
                Ok(())
            }
            StorageBackend::S3(_) => {
                let prefix = object_store::path::Path::from(self.container.as_str());
                let mut listing = self.backend.store().list(Some(&prefix));
                if let Some(Err(e)) = listing.next().await {
                    return Err(e.into());
                }
                Ok(())
            }
        }
    }

    /// Write a new blob. Fails with [`StorageError::Conflict`] if the key is
    /// already taken, so an upload can never silently replace a document.
    pub async fn put_new(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        let path = self.object_path(key);
        match self
            .backend
            .store()
            .put_opts(&path, data.into(), PutMode::Create.into())
            .await
        {
            Ok(_) => Ok(()),
            Err(object_store::Error::AlreadyExists { path, .. }) => {
                Err(StorageError::Conflict(path))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write a blob, replacing any existing content at the key.
    pub async fn put(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        let path = self.object_path(key);
        self.backend.store().put(&path, data.into()).await?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.object_path(key);
        self.get_path(&path).await
    }

    /// Download a blob addressed by one of our own URLs (see [`Self::url_for`]).
    pub async fn get_url(&self, raw: &str) -> Result<Bytes, StorageError> {
        let path = self.resolve_url(raw)?;
        self.get_path(&path).await
    }

    async fn get_path(&self, path: &object_store::path::Path) -> Result<Bytes, StorageError> {
        match self.backend.store().get(path).await {
            Ok(result) => Ok(result.bytes().await?),
            Err(object_store::Error::NotFound { path, .. }) => Err(StorageError::NotFound(path)),
            Err(e) => Err(e.into()),
        }
    }

    /// Render the fully-qualified URL for a blob key.
    ///
    /// Local blobs get `file://` URLs, S3 blobs the virtual-hosted form, and
    /// custom endpoints (MinIO, LocalStack) the path-style form. Key segments
    /// are percent-encoded, so the result always parses and
    /// [`Self::resolve_url`] maps it back to the stored path.
    pub fn url_for(&self, key: &str) -> String {
        match &self.backend {
            StorageBackend::Local(local) => {
                let full = local.data_dir.join(&self.container).join(key);
                match Url::from_file_path(&full) {
                    Ok(url) => url.to_string(),
                    Err(_) => format!("file://{}", full.display()),
                }
            }
            StorageBackend::S3(s3) => {
                let path = self.object_path(key);
                let base = match &s3.endpoint {
                    Some(endpoint) => format!("{}/{}", endpoint, s3.bucket),
                    None => format!("https://{}.s3.{}.amazonaws.com", s3.bucket, s3.region),
                };
                match Url::parse(&base) {
                    Ok(mut url) => {
                        match url.path_segments_mut() {
                            Ok(mut segments) => {
                                segments.pop_if_empty().extend(path.as_ref().split('/'));
                            }
                            Err(()) => return format!("{base}/{path}"),
                        }
                        url.to_string()
                    }
                    Err(_) => format!("{base}/{path}"),
                }
            }
        }
    }

    /// Parse a blob URL back into a store path (`{container}/{key}`).
    ///
    /// Only URLs that address the configured backend resolve; anything else
    /// is rejected as [`StorageError::InvalidUrl`].
    pub fn resolve_url(&self, raw: &str) -> Result<object_store::path::Path, StorageError> {
        let url =
            Url::parse(raw).map_err(|e| StorageError::InvalidUrl(format!("{raw}: {e}")))?;

        match (&self.backend, url.scheme()) {
            (StorageBackend::Local(local), "file") => {
                let fs_path = url
                    .to_file_path()
                    .map_err(|_| StorageError::InvalidUrl(format!("not a file path: {raw}")))?;
                let relative = fs_path.strip_prefix(&local.data_dir).map_err(|_| {
                    StorageError::InvalidUrl(format!("blob outside data dir: {raw}"))
                })?;
                let key = relative
                    .components()
                    .filter_map(|c| c.as_os_str().to_str())
                    .collect::<Vec<_>>()
                    .join("/");
                Ok(object_store::path::Path::from(key))
            }
            (StorageBackend::S3(s3), "http") | (StorageBackend::S3(s3), "https") => {
                match &s3.endpoint {
                    Some(endpoint) => {
                        if !url.origin().ascii_serialization().eq_ignore_ascii_case(endpoint) {
                            return Err(StorageError::InvalidUrl(format!(
                                "host does not match the configured endpoint: {raw}"
                            )));
                        }
                    }
                    None => {
                        let expected = format!("{}.s3.{}.amazonaws.com", s3.bucket, s3.region);
                        if url.host_str() != Some(expected.as_str()) {
                            return Err(StorageError::InvalidUrl(format!(
                                "host does not address bucket {}: {raw}",
                                s3.bucket
                            )));
                        }
                    }
                }

                let mut segments: Vec<&str> = url
                    .path_segments()
                    .map(|s| s.filter(|part| !part.is_empty()).collect())
                    .unwrap_or_default();

                // Path-style URLs carry the bucket as the first segment
                if s3.endpoint.is_some() && segments.first() == Some(&s3.bucket.as_str()) {
                    segments.remove(0);
                }
                if segments.len() < 2 {
                    return Err(StorageError::InvalidUrl(format!("no blob path in {raw}")));
                }
                // Segments are still percent-encoded; decode them back to the
                // stored key.
                object_store::path::Path::from_url_path(segments.join("/"))
                    .map_err(|e| StorageError::InvalidUrl(format!("{raw}: {e}")))
            }
            _ => Err(StorageError::InvalidUrl(format!(
                "scheme {} does not match the configured storage backend",
                url.scheme()
            ))),
        }
    }

    fn object_path(&self, key: &str) -> object_store::path::Path {
        object_store::path::Path::from(format!("{}/{}", self.container, key))
    }
}
