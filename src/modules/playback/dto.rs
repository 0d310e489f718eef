use serde::Serialize;
use utoipa::ToSchema;

use super::model::VideoDescriptor;

#[derive(Debug, Serialize, ToSchema)]
pub struct HlsLinks {
    /// Proxy URL of the master manifest; empty while transcoding is pending.
    pub master: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorResponse {
    pub upload_id: String,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub duration: Option<f64>,
    pub status: String,
    pub hls: HlsLinks,
    pub thumbnail: String,
}

impl DescriptorResponse {
    pub fn from_descriptor(video: VideoDescriptor) -> Self {
        let base = format!("/playback/videos/{}", video.upload_id);
        let master = if video.is_ready() {
            format!("{}/master.m3u8", base)
        } else {
            String::new()
        };
        let thumbnail = if video.thumbnail_url.trim().is_empty() {
            String::new()
        } else {
            format!("{}/thumbnail.jpg", base)
        };

        Self {
            upload_id: video.upload_id,
            title: video.title,
            description: video.description,
            tags: video.tags,
            category: video.category,
            duration: video.duration,
            status: video.status,
            hls: HlsLinks { master },
            thumbnail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_point_at_the_proxy() {
        let dto = DescriptorResponse::from_descriptor(VideoDescriptor {
            upload_id: "abc123".into(),
            hls_master_url: "http://minio:9000/b/hls/u1/abc123/master.m3u8".into(),
            thumbnail_url: "http://minio:9000/b/thumbnails/u1/abc123.jpg".into(),
            ..Default::default()
        });
        assert_eq!(dto.hls.master, "/playback/videos/abc123/master.m3u8");
        assert_eq!(dto.thumbnail, "/playback/videos/abc123/thumbnail.jpg");
    }

    #[test]
    fn pending_video_has_no_links() {
        let dto = DescriptorResponse::from_descriptor(VideoDescriptor {
            upload_id: "abc123".into(),
            ..Default::default()
        });
        assert!(dto.hls.master.is_empty());
        assert!(dto.thumbnail.is_empty());
    }
}
