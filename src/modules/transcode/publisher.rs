use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{StreamExt, TryStreamExt, stream};
use tracing::{info, warn};
use walkdir::WalkDir;

use super::encoder::Encoder;
use super::error::{EncodeError, JobError};
use super::events::CompletionEvent;
use super::workspace::TranscodeWorkspace;
use crate::common::layout::{self, MASTER_MANIFEST};
use crate::config::settings::StorageConfig;
use crate::infrastructure::queue::rabbitmq::EventPublisher;
use crate::infrastructure::storage::{ObjectStore, StorageError, content_type_for_path};

/// Concurrent segment uploads per job.
const UPLOAD_CONCURRENCY: usize = 4;

/// How stored blob paths are turned into playback URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlPolicy {
    /// `<base>/<path>`
    PublicBase(String),
    /// `<scheme>://<host>:<port>/<bucket>/<path>`
    Endpoint { origin: String, bucket: String },
    /// `/<path>`
    Relative,
}

impl UrlPolicy {
    pub fn from_config(config: &StorageConfig) -> Self {
        if let Some(base) = &config.public_base {
            return UrlPolicy::PublicBase(base.trim_end_matches('/').to_string());
        }
        match config.endpoint_url() {
            Some(origin) => UrlPolicy::Endpoint {
                origin,
                bucket: config.processed_bucket.clone(),
            },
            None => {
                warn!("Storage endpoint not set, completion events will carry relative URLs");
                UrlPolicy::Relative
            }
        }
    }

    pub fn url_for(&self, blob_path: &str) -> String {
        let blob_path = blob_path.trim_start_matches('/');
        match self {
            UrlPolicy::PublicBase(base) => format!("{}/{}", base, blob_path),
            UrlPolicy::Endpoint { origin, bucket } => format!("{}/{}/{}", origin, bucket, blob_path),
            UrlPolicy::Relative => format!("/{}", blob_path),
        }
    }
}

/// Uploads a finished job and announces it.
pub struct ResultPublisher {
    store: Arc<dyn ObjectStore>,
    events: Arc<dyn EventPublisher>,
    encoder: Arc<dyn Encoder>,
    urls: UrlPolicy,
    completion_queue: String,
}

impl ResultPublisher {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        events: Arc<dyn EventPublisher>,
        encoder: Arc<dyn Encoder>,
        urls: UrlPolicy,
        completion_queue: impl Into<String>,
    ) -> Self {
        Self {
            store,
            events,
            encoder,
            urls,
            completion_queue: completion_queue.into(),
        }
    }

    pub fn urls(&self) -> &UrlPolicy {
        &self.urls
    }

    /// Uploads every file under `local_root` to `prefix`, keeping relative
    /// paths. The master manifest is written last so it never exists in
    /// storage ahead of the renditions it lists. Returns the uploaded keys.
    pub async fn upload_tree(&self, local_root: &Path, prefix: &str) -> Result<Vec<String>, JobError> {
        let mut files: Vec<(PathBuf, String)> = Vec::new();
        let mut master: Option<(PathBuf, String)> = None;

        for entry in WalkDir::new(local_root).sort_by_file_name() {
            let entry = entry.map_err(|e| JobError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(local_root)
                .map_err(|e| JobError::Io(std::io::Error::other(e)))?;
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let key = format!("{}/{}", prefix, rel);

            if rel == MASTER_MANIFEST {
                master = Some((entry.path().to_path_buf(), key));
            } else {
                files.push((entry.path().to_path_buf(), key));
            }
        }

        let mut uploaded: Vec<String> = stream::iter(files)
            .map(|(path, key)| self.upload_file(path, key))
            .buffer_unordered(UPLOAD_CONCURRENCY)
            .try_collect()
            .await?;

        if let Some((path, key)) = master {
            uploaded.push(self.upload_file(path, key).await?);
        }

        info!(prefix, objects = uploaded.len(), "⬆️ Uploaded HLS tree");
        Ok(uploaded)
    }

    async fn upload_file(&self, path: PathBuf, key: String) -> Result<String, JobError> {
        let data = tokio::fs::read(&path).await.map_err(StorageError::from)?;
        self.store
            .put(&key, Bytes::from(data), &content_type_for_path(&key))
            .await?;
        Ok(key)
    }

    /// Extracts and uploads the thumbnail. Failure is logged and yields
    /// `None`; it never fails the job.
    pub async fn publish_thumbnail(
        &self,
        workspace: &TranscodeWorkspace,
        user_id: &str,
        upload_id: &str,
    ) -> Option<String> {
        let input = workspace.input_path();
        let output = workspace.thumbnail_path();
        let encoder = Arc::clone(&self.encoder);
        let frame = output.clone();

        let extracted = tokio::task::spawn_blocking(move || encoder.extract_thumbnail(&input, &frame))
            .await
            .map_err(|e| EncodeError::Aborted(e.to_string()))
            .and_then(|r| r);
        if let Err(e) = extracted {
            warn!(upload_id, error = %e, "Thumbnail extraction failed, continuing without");
            return None;
        }

        let key = layout::thumbnail_path(user_id, upload_id);
        let uploaded = match tokio::fs::read(&output).await {
            Ok(data) => self.store.put(&key, Bytes::from(data), mime::IMAGE_JPEG.as_ref()).await,
            Err(e) => Err(StorageError::from(e)),
        };
        match uploaded {
            Ok(()) => Some(self.urls.url_for(&key)),
            Err(e) => {
                warn!(upload_id, error = %e, "Thumbnail upload failed, continuing without");
                None
            }
        }
    }

    pub async fn emit(&self, event: &CompletionEvent) -> Result<(), JobError> {
        let payload = serde_json::to_vec(event).map_err(|e| JobError::Publish(e.to_string()))?;
        self.events
            .publish_json(&self.completion_queue, &payload)
            .await
            .map_err(|e| JobError::Publish(e.to_string()))?;
        info!(upload_id = %event.upload_id, queue = %self.completion_queue, "📣 Completion event published");
        Ok(())
    }
}
