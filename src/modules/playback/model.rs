use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Catalog row as seen by playback. Owned and written by the catalog
/// service; read-only here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoDescriptor {
    pub upload_id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub duration: Option<f64>,
    /// Empty until the transcoder has published the master manifest.
    pub hls_master_url: String,
    pub thumbnail_url: String,
    pub status: String,
}

impl VideoDescriptor {
    pub fn is_ready(&self) -> bool {
        !self.hls_master_url.trim().is_empty()
    }
}
