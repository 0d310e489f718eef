use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use tracing::{debug, error};
use url::Url;

use super::cache::{CacheKind, SegmentCache};
use super::error::PlaybackError;
use crate::common::layout::MASTER_MANIFEST;
use crate::infrastructure::storage::{ObjectStore, StorageError};

/// Host suffixes of hosted object stores whose URLs put the object path
/// directly after the host.
const CLOUD_HOST_SUFFIXES: &[&str] = &[
    ".blob.core.windows.net",
    ".amazonaws.com",
    ".digitaloceanspaces.com",
];

/// Resolves a stored manifest URL to an object path inside `bucket`.
///
/// Tried in order: a hosted-store URL, a generic `http(s)://host[:port]/...`
/// URL, then a relative path. Hosted URLs are also valid generic URLs, so
/// the order is significant.
pub fn extract_blob_path(stored: &str, bucket: &str) -> String {
    if let Some(path) = cloud_path(stored) {
        return strip_bucket(&path, bucket);
    }

    if let Some(rest) = stored
        .strip_prefix("http://")
        .or_else(|| stored.strip_prefix("https://"))
    {
        return match rest.split_once('/') {
            Some((_host, path)) => strip_bucket(path, bucket),
            None => String::new(),
        };
    }

    stored.trim_start_matches('/').to_string()
}

fn cloud_path(stored: &str) -> Option<String> {
    let url = Url::parse(stored).ok()?;
    let host = url.host_str()?;
    if !CLOUD_HOST_SUFFIXES.iter().any(|suffix| host.ends_with(suffix)) {
        return None;
    }
    Some(url.path().to_string())
}

fn strip_bucket(path: &str, bucket: &str) -> String {
    let path = path.trim_start_matches('/');
    let path = if bucket.is_empty() {
        path
    } else {
        path.strip_prefix(bucket)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(path)
    };
    path.trim_start_matches('/').to_string()
}

/// Object path of the directory holding the master manifest.
pub fn blob_base(stored: &str, bucket: &str) -> String {
    let path = extract_blob_path(stored, bucket);
    match path.strip_suffix(MASTER_MANIFEST) {
        Some(base) => base.trim_end_matches('/').to_string(),
        None => path,
    }
}

/// Public URL of the directory holding the master manifest.
pub fn base_hls_path(stored: &str) -> &str {
    stored
        .strip_suffix(MASTER_MANIFEST)
        .map(|base| base.trim_end_matches('/'))
        .unwrap_or(stored)
}

/// Reads HLS assets out of the processed bucket, with segments and
/// thumbnails going through the cache.
pub struct PrivateResolver {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    cache: SegmentCache,
}

impl PrivateResolver {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, cache: SegmentCache) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            cache,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn cache(&self) -> &SegmentCache {
        &self.cache
    }

    pub fn locate(&self, stored_url: &str) -> String {
        extract_blob_path(stored_url, &self.bucket)
    }

    pub fn locate_base(&self, stored_url: &str) -> String {
        blob_base(stored_url, &self.bucket)
    }

    /// Uncached read, used for manifests.
    pub async fn fetch(&self, blob_path: &str) -> Result<Bytes, PlaybackError> {
        debug!(path = %blob_path, "Reading manifest from storage");
        self.store
            .get(blob_path)
            .await
            .map_err(|e| PlaybackError::Upstream(e.to_string()))
    }

    pub async fn fetch_cached(
        &self,
        kind: CacheKind,
        upload_id: &str,
        blob_path: &str,
    ) -> Result<Bytes, StorageError> {
        self.cache.get_or_fetch(kind, upload_id, blob_path).await
    }
}

/// Fetches assets over plain HTTP from the URLs stored in the catalog.
pub struct PublicPassthrough {
    http: reqwest::Client,
}

impl PublicPassthrough {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    pub async fn get(&self, url: &str) -> Result<reqwest::Response, PlaybackError> {
        self.http.get(url).send().await.map_err(|e| {
            error!(url, error = %e, "Upstream request failed");
            PlaybackError::Upstream(e.to_string())
        })
    }

    /// Fetches a text body, returning the upstream status alongside it.
    pub async fn get_text(&self, url: &str) -> Result<(StatusCode, String), PlaybackError> {
        let resp = self.get(url).await?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| PlaybackError::Upstream(e.to_string()))?;
        Ok((status, body))
    }
}

/// Storage access strategy, chosen once at startup from whether storage
/// credentials are configured.
pub enum PlaybackBackend {
    Private(PrivateResolver),
    Public(PublicPassthrough),
}

impl PlaybackBackend {
    pub fn mode(&self) -> &'static str {
        match self {
            PlaybackBackend::Private(_) => "private",
            PlaybackBackend::Public(_) => "public",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUCKET: &str = "processed-videos";
    const EXPECTED: &str = "hls/u1/abc123/master.m3u8";

    #[test]
    fn equivalent_inputs_resolve_to_the_same_path() {
        let inputs = [
            "https://acct.blob.core.windows.net/processed-videos/hls/u1/abc123/master.m3u8",
            "https://s3.us-east-1.amazonaws.com/processed-videos/hls/u1/abc123/master.m3u8",
            "http://minio:9000/processed-videos/hls/u1/abc123/master.m3u8",
            "http://localhost/processed-videos/hls/u1/abc123/master.m3u8",
            "/hls/u1/abc123/master.m3u8",
            "hls/u1/abc123/master.m3u8",
        ];
        for input in inputs {
            assert_eq!(extract_blob_path(input, BUCKET), EXPECTED, "{input}");
        }
    }

    #[test]
    fn virtual_hosted_urls_have_no_bucket_segment() {
        assert_eq!(
            extract_blob_path(
                "https://processed-videos.s3.amazonaws.com/hls/u1/abc123/master.m3u8",
                BUCKET
            ),
            EXPECTED
        );
    }

    #[test]
    fn generic_url_without_bucket_keeps_path() {
        assert_eq!(
            extract_blob_path("http://cdn.example:8080/hls/u1/abc123/master.m3u8", BUCKET),
            EXPECTED
        );
        assert_eq!(extract_blob_path("http://cdn.example", BUCKET), "");
    }

    #[test]
    fn bucket_prefix_must_be_a_whole_segment() {
        assert_eq!(
            extract_blob_path("http://minio:9000/processed-videos-old/x.m3u8", BUCKET),
            "processed-videos-old/x.m3u8"
        );
    }

    #[test]
    fn base_paths_drop_master_manifest() {
        assert_eq!(
            blob_base("http://minio:9000/processed-videos/hls/u1/abc123/master.m3u8", BUCKET),
            "hls/u1/abc123"
        );
        assert_eq!(
            base_hls_path("https://cdn.example/hls/u1/abc123/master.m3u8"),
            "https://cdn.example/hls/u1/abc123"
        );
    }
}
