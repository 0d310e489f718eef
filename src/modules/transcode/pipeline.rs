use std::sync::Arc;

use tracing::info;

use super::encoder::Encoder;
use super::error::JobError;
use super::events::{CompletionEvent, UploadEvent};
use super::ladder::{LadderBuilder, resolve_ladder};
use super::manifest::build_master;
use super::profile::RenditionSpec;
use super::publisher::ResultPublisher;
use super::workspace::TranscodeWorkspace;
use crate::common::layout;
use crate::infrastructure::storage::ObjectStore;

/// One complete job attempt: download, encode every rendition, synthesize
/// the master manifest, upload, publish.
///
/// Every attempt re-encodes from scratch; renditions left in storage by a
/// failed earlier attempt are simply overwritten.
pub struct TranscodePipeline {
    raw_store: Arc<dyn ObjectStore>,
    ladder: LadderBuilder,
    publisher: ResultPublisher,
}

impl TranscodePipeline {
    pub fn new(raw_store: Arc<dyn ObjectStore>, encoder: Arc<dyn Encoder>, publisher: ResultPublisher) -> Self {
        Self {
            raw_store,
            ladder: LadderBuilder::new(encoder),
            publisher,
        }
    }

    pub async fn run(&self, event: &UploadEvent) -> Result<CompletionEvent, JobError> {
        let labels = event.ladder();
        let specs = resolve_ladder(&labels)?;

        let workspace = TranscodeWorkspace::create(&event.upload_id, &event.raw_video_path)?;
        let result = self.run_in(&workspace, event, &labels, &specs).await;
        workspace.release();
        result
    }

    async fn run_in(
        &self,
        workspace: &TranscodeWorkspace,
        event: &UploadEvent,
        labels: &[String],
        specs: &[&'static RenditionSpec],
    ) -> Result<CompletionEvent, JobError> {
        let upload_id = event.upload_id.as_str();

        info!(upload_id, path = %event.raw_video_path, "⬇️ Downloading source");
        let source = self.raw_store.get(&event.raw_video_path).await?;
        tokio::fs::write(workspace.input_path(), &source).await?;
        info!(upload_id, bytes = source.len(), "⬇️ Downloaded source");
        drop(source);

        let built = self.ladder.build(workspace, upload_id, specs).await?;
        info!(upload_id, renditions = built.len(), "All renditions built");

        tokio::fs::write(workspace.master_path(), build_master(labels)).await?;

        let prefix = layout::hls_prefix(&event.user_id, upload_id);
        self.publisher.upload_tree(&workspace.output_root(), &prefix).await?;

        let thumbnail_url = self
            .publisher
            .publish_thumbnail(workspace, &event.user_id, upload_id)
            .await;

        let master_url = self
            .publisher
            .urls()
            .url_for(&layout::master_manifest_path(&event.user_id, upload_id));
        let completion = CompletionEvent::from_upload(event, master_url, thumbnail_url);

        self.publisher.emit(&completion).await?;
        Ok(completion)
    }
}
