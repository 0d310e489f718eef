use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::model::VideoDescriptor;
use crate::infrastructure::db::pool::DbPool;

#[async_trait]
pub trait VideoRepository: Send + Sync {
    async fn find_by_upload_id(&self, upload_id: &str) -> Result<Option<VideoDescriptor>>;
}

pub struct PgVideoRepository {
    pool: DbPool,
}

impl PgVideoRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoRepository for PgVideoRepository {
    async fn find_by_upload_id(&self, upload_id: &str) -> Result<Option<VideoDescriptor>> {
        let video = sqlx::query_as::<_, VideoDescriptor>(
            r#"
            SELECT
                upload_id,
                user_id,
                title,
                description,
                COALESCE(tags, ARRAY[]::TEXT[]) AS tags,
                category,
                duration,
                COALESCE(hls_master_url, '') AS hls_master_url,
                COALESCE(thumbnail_url, '') AS thumbnail_url,
                COALESCE(status, '') AS status
            FROM videos
            WHERE upload_id = $1
            LIMIT 1
            "#,
        )
        .bind(upload_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(video)
    }
}

/// Descriptor lookup backed by a map, for tests and local runs.
#[derive(Clone, Default)]
pub struct InMemoryVideoRepository {
    videos: Arc<RwLock<HashMap<String, VideoDescriptor>>>,
}

impl InMemoryVideoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, video: VideoDescriptor) {
        self.videos
            .write()
            .await
            .insert(video.upload_id.clone(), video);
    }
}

#[async_trait]
impl VideoRepository for InMemoryVideoRepository {
    async fn find_by_upload_id(&self, upload_id: &str) -> Result<Option<VideoDescriptor>> {
        Ok(self.videos.read().await.get(upload_id).cloned())
    }
}
