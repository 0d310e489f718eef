use std::sync::Arc;

use tracing::{info, warn};

use super::cache::SegmentCache;
use crate::common::layout;
use crate::infrastructure::storage::ObjectStore;
use crate::modules::transcode::events::VideoDeletedEvent;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PurgeReport {
    pub raw_deleted: bool,
    pub hls_objects: usize,
    pub thumbnail_deleted: bool,
    pub cache_entries: usize,
}

/// Removes every stored and cached artifact of a deleted video.
///
/// Each step runs regardless of whether the previous one failed.
pub struct AssetPurger {
    raw_store: Arc<dyn ObjectStore>,
    processed_store: Arc<dyn ObjectStore>,
    cache: SegmentCache,
}

impl AssetPurger {
    pub fn new(raw_store: Arc<dyn ObjectStore>, processed_store: Arc<dyn ObjectStore>, cache: SegmentCache) -> Self {
        Self {
            raw_store,
            processed_store,
            cache,
        }
    }

    pub async fn purge(&self, event: &VideoDeletedEvent) -> PurgeReport {
        let upload_id = event.upload_id.as_str();
        let mut report = PurgeReport::default();

        if let Some(raw) = event.raw_video_path.as_deref().filter(|p| !p.is_empty()) {
            match self.raw_store.delete(raw).await {
                Ok(()) => report.raw_deleted = true,
                Err(e) => warn!(upload_id, path = raw, error = %e, "Raw source delete failed"),
            }
        }

        let prefix = format!("{}/", layout::hls_prefix(&event.user_id, upload_id));
        match self.processed_store.delete_prefix(&prefix).await {
            Ok(n) => report.hls_objects = n,
            Err(e) => warn!(upload_id, prefix = %prefix, error = %e, "HLS tree delete failed"),
        }

        let thumbnail = layout::thumbnail_path(&event.user_id, upload_id);
        match self.processed_store.delete(&thumbnail).await {
            Ok(()) => report.thumbnail_deleted = true,
            Err(e) => warn!(upload_id, path = %thumbnail, error = %e, "Thumbnail delete failed"),
        }

        report.cache_entries = self.cache.purge(upload_id).await;

        info!(
            upload_id,
            raw = report.raw_deleted,
            hls_objects = report.hls_objects,
            thumbnail = report.thumbnail_deleted,
            cache_entries = report.cache_entries,
            "🧹 Purged video assets"
        );
        report
    }
}
