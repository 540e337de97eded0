//! Blob retrieval by URL with ambient AWS credentials.
//!
//! The worker falls back to this path when it has no static storage
//! credentials of its own: the blob URL carries everything needed to locate
//! the object, and the credentials come from the environment (profile,
//! instance metadata, or exported keys).

use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::ObjectStore;
use url::Url;

use crate::error::StorageError;

/// Fetch a blob by its fully-qualified URL.
pub async fn fetch_url(raw: &str) -> Result<Bytes, StorageError> {
    let url = Url::parse(raw).map_err(|e| StorageError::InvalidUrl(format!("{raw}: {e}")))?;

    match url.scheme() {
        "file" => {
            let path = url
                .to_file_path()
                .map_err(|_| StorageError::InvalidUrl(format!("not a file path: {raw}")))?;
            match tokio::fs::read(&path).await {
                Ok(data) => Ok(Bytes::from(data)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(StorageError::NotFound(path.display().to_string()))
                }
                Err(e) => Err(e.into()),
            }
        }
        "http" | "https" => fetch_s3_url(&url).await,
        other => Err(StorageError::InvalidUrl(format!(
            "unsupported scheme {other}: {raw}"
        ))),
    }
}

async fn fetch_s3_url(url: &Url) -> Result<Bytes, StorageError> {
    let host = url
        .host_str()
        .ok_or_else(|| StorageError::InvalidUrl(url.to_string()))?;
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|part| !part.is_empty()).collect())
        .unwrap_or_default();

    let mut builder = AmazonS3Builder::from_env();

    let path = if let Some((bucket, region)) = parse_virtual_hosted(host) {
        builder = builder.with_bucket_name(bucket).with_region(region);
        blob_path(&segments, url)?
    } else {
        // Path-style URL against a custom endpoint: first segment is the bucket
        let (bucket, rest) = segments
            .split_first()
            .ok_or_else(|| StorageError::InvalidUrl(format!("no bucket in {url}")))?;
        let endpoint = match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
            None => format!("{}://{}", url.scheme(), host),
        };
        // Path-style URLs carry no region; signing still needs one.
        let region = std::env::var("AWS_REGION")
            .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
            .unwrap_or_else(|_| "us-east-1".to_string());
        builder = builder
            .with_bucket_name(*bucket)
            .with_region(region)
            .with_endpoint(&endpoint)
            .with_allow_http(url.scheme() == "http");
        blob_path(rest, url)?
    };

    let store = builder.build()?;
    match store.get(&path).await {
        Ok(result) => Ok(result.bytes().await?),
        Err(object_store::Error::NotFound { path, .. }) => Err(StorageError::NotFound(path)),
        Err(e) => Err(e.into()),
    }
}

/// Decode URL path segments into the store path they address.
///
/// Blob URLs carry the key percent-encoded; the stored path is the decoded
/// form.
fn blob_path(segments: &[&str], url: &Url) -> Result<object_store::path::Path, StorageError> {
    if segments.is_empty() {
        return Err(StorageError::InvalidUrl(format!("no blob path in {url}")));
    }
    object_store::path::Path::from_url_path(segments.join("/"))
        .map_err(|e| StorageError::InvalidUrl(format!("{url}: {e}")))
}

/// Split a virtual-hosted S3 host (`{bucket}.s3.{region}.amazonaws.com`)
/// into bucket and region.
fn parse_virtual_hosted(host: &str) -> Option<(&str, &str)> {
    let rest = host.strip_suffix(".amazonaws.com")?;
    let (bucket, region) = rest.split_once(".s3.")?;
    if bucket.is_empty() || region.is_empty() || region.contains('.') {
        return None;
    }
    Some((bucket, region))
}
