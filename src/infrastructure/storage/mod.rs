pub mod memory;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {path}")]
    NotFound { path: String },

    #[error("GET {path} failed: {reason}")]
    Get { path: String, reason: String },

    #[error("PUT {path} failed: {reason}")]
    Put { path: String, reason: String },

    #[error("DELETE {path} failed: {reason}")]
    Delete { path: String, reason: String },

    #[error("LIST {prefix} failed: {reason}")]
    List { prefix: String, reason: String },

    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Binary blobs addressed by path inside a single bucket.
///
/// Implementations must be safe for concurrent use by independent callers;
/// the transcoder workers and every playback request share one instance.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Bytes, StorageError>;

    async fn put(&self, path: &str, body: Bytes, content_type: &str) -> Result<(), StorageError>;

    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// Keys under `prefix`. Listing is best-effort: objects written
    /// concurrently may or may not appear.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Deletes every listed key under `prefix` and returns how many were
    /// removed. Individual delete failures are logged and skipped.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        let keys = self.list(prefix).await?;
        let mut deleted = 0;
        for key in keys {
            match self.delete(&key).await {
                Ok(()) => deleted += 1,
                Err(e) => warn!(key = %key, error = %e, "Failed to delete object under prefix"),
            }
        }
        Ok(deleted)
    }
}

/// Content type for an uploaded blob, keyed on its extension.
pub fn content_type_for_path(path: &str) -> String {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".m3u8") {
        "application/vnd.apple.mpegurl".to_string()
    } else if lower.ends_with(".ts") {
        "video/MP2T".to_string()
    } else if lower.ends_with(".m4s") {
        "video/iso.segment".to_string()
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        mime::IMAGE_JPEG.to_string()
    } else {
        mime_guess::from_path(&lower)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}
