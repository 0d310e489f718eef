use std::sync::Arc;

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::{error, warn};

use super::cache::CacheKind;
use super::dto::DescriptorResponse;
use super::error::PlaybackError;
use super::model::VideoDescriptor;
use super::repository::VideoRepository;
use super::resolver::{PlaybackBackend, base_hls_path};
use super::rewriter::rewrite_master;
use crate::common::layout;
use crate::infrastructure::storage::content_type_for_path;
use crate::modules::transcode::profile::is_allowed;

const HLS_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const SEGMENT_CACHE_CONTROL: &str = "public, max-age=60";
const THUMBNAIL_CACHE_CONTROL: &str = "public, max-age=3600";
const SEGMENT_EXTENSIONS: &[&str] = &[".ts", ".m4s"];

/// Headers that describe a single hop and must not be forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// What a playback operation hands back to the HTTP layer.
pub enum PlaybackAsset {
    Manifest {
        status: StatusCode,
        body: String,
    },
    Blob {
        data: Bytes,
        content_type: String,
        cache_control: &'static str,
    },
    Proxied(reqwest::Response),
    Redirect(String),
}

impl IntoResponse for PlaybackAsset {
    fn into_response(self) -> Response {
        match self {
            PlaybackAsset::Manifest { status, body } => {
                (status, [(header::CONTENT_TYPE, HLS_CONTENT_TYPE)], body).into_response()
            }
            PlaybackAsset::Blob {
                data,
                content_type,
                cache_control,
            } => (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::CACHE_CONTROL, cache_control.to_string()),
                ],
                data,
            )
                .into_response(),
            PlaybackAsset::Proxied(upstream) => proxied_response(upstream),
            PlaybackAsset::Redirect(location) => {
                (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
            }
        }
    }
}

fn proxied_response(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(SEGMENT_CACHE_CONTROL),
    );

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn validate_rendition(rendition: &str) -> Result<(), PlaybackError> {
    if is_allowed(rendition) {
        Ok(())
    } else {
        Err(PlaybackError::InvalidParameter("rendition"))
    }
}

fn validate_segment(segment: &str) -> Result<(), PlaybackError> {
    let plain = !segment.is_empty()
        && !segment.contains(['/', '\\'])
        && !segment.contains("..");
    if plain && SEGMENT_EXTENSIONS.iter().any(|ext| segment.ends_with(ext)) {
        Ok(())
    } else {
        Err(PlaybackError::InvalidParameter("segment"))
    }
}

fn join_blob(base: &str, rest: &str) -> String {
    if base.is_empty() {
        rest.to_string()
    } else {
        format!("{}/{}", base, rest)
    }
}

pub struct PlaybackService {
    repo: Arc<dyn VideoRepository>,
    backend: PlaybackBackend,
}

impl PlaybackService {
    pub fn new(repo: Arc<dyn VideoRepository>, backend: PlaybackBackend) -> Self {
        Self { repo, backend }
    }

    pub fn backend(&self) -> &PlaybackBackend {
        &self.backend
    }

    async fn find(&self, upload_id: &str) -> Result<VideoDescriptor, PlaybackError> {
        match self.repo.find_by_upload_id(upload_id).await {
            Ok(Some(video)) => Ok(video),
            Ok(None) => Err(PlaybackError::NotFound("video")),
            Err(e) => Err(PlaybackError::Internal(e.to_string())),
        }
    }

    async fn find_ready(&self, upload_id: &str) -> Result<VideoDescriptor, PlaybackError> {
        let video = self.find(upload_id).await?;
        if !video.is_ready() {
            return Err(PlaybackError::NotReady);
        }
        Ok(video)
    }

    pub async fn get_descriptor(&self, upload_id: &str) -> Result<DescriptorResponse, PlaybackError> {
        let video = self.find(upload_id).await?;
        Ok(DescriptorResponse::from_descriptor(video))
    }

    pub async fn get_master(&self, upload_id: &str) -> Result<PlaybackAsset, PlaybackError> {
        let video = self.find_ready(upload_id).await?;

        let raw = match &self.backend {
            PlaybackBackend::Private(resolver) => {
                let path = resolver.locate(&video.hls_master_url);
                let data = resolver.fetch(&path).await?;
                String::from_utf8_lossy(&data).into_owned()
            }
            PlaybackBackend::Public(passthrough) => {
                let (status, body) = passthrough.get_text(&video.hls_master_url).await?;
                if !status.is_success() {
                    return Err(PlaybackError::Upstream(format!(
                        "master manifest returned {}",
                        status
                    )));
                }
                body
            }
        };

        Ok(PlaybackAsset::Manifest {
            status: StatusCode::OK,
            body: rewrite_master(&raw),
        })
    }

    pub async fn get_variant(&self, upload_id: &str, rendition: &str) -> Result<PlaybackAsset, PlaybackError> {
        validate_rendition(rendition)?;
        let video = self.find_ready(upload_id).await?;
        let relative = layout::variant_reference(rendition);

        match &self.backend {
            PlaybackBackend::Private(resolver) => {
                let path = join_blob(&resolver.locate_base(&video.hls_master_url), &relative);
                let data = resolver.fetch(&path).await?;
                Ok(PlaybackAsset::Manifest {
                    status: StatusCode::OK,
                    body: String::from_utf8_lossy(&data).into_owned(),
                })
            }
            PlaybackBackend::Public(passthrough) => {
                let url = format!("{}/{}", base_hls_path(&video.hls_master_url), relative);
                let (status, body) = passthrough.get_text(&url).await?;
                Ok(PlaybackAsset::Manifest { status, body })
            }
        }
    }

    pub async fn get_segment(
        &self,
        upload_id: &str,
        rendition: &str,
        segment: &str,
    ) -> Result<PlaybackAsset, PlaybackError> {
        validate_rendition(rendition)?;
        validate_segment(segment)?;
        let video = self.find_ready(upload_id).await?;
        let relative = format!("{}/{}", rendition, segment);

        match &self.backend {
            PlaybackBackend::Private(resolver) => {
                let path = join_blob(&resolver.locate_base(&video.hls_master_url), &relative);
                let data = resolver
                    .fetch_cached(CacheKind::Segment, upload_id, &path)
                    .await
                    .map_err(|e| {
                        error!(upload_id, path = %path, error = %e, "Segment read failed");
                        PlaybackError::Upstream(e.to_string())
                    })?;
                Ok(PlaybackAsset::Blob {
                    data,
                    content_type: content_type_for_path(&path),
                    cache_control: SEGMENT_CACHE_CONTROL,
                })
            }
            PlaybackBackend::Public(passthrough) => {
                let url = format!("{}/{}", base_hls_path(&video.hls_master_url), relative);
                Ok(PlaybackAsset::Proxied(passthrough.get(&url).await?))
            }
        }
    }

    pub async fn get_thumbnail(&self, upload_id: &str) -> Result<PlaybackAsset, PlaybackError> {
        let video = self.find_ready(upload_id).await?;
        if video.thumbnail_url.trim().is_empty() {
            return Err(PlaybackError::NotFound("thumbnail"));
        }

        match &self.backend {
            PlaybackBackend::Private(resolver) => {
                let path = layout::thumbnail_path(&video.user_id, &video.upload_id);
                let data = resolver
                    .fetch_cached(CacheKind::Thumbnail, upload_id, &path)
                    .await
                    .map_err(|e| {
                        warn!(upload_id, path = %path, error = %e, "Thumbnail read failed");
                        PlaybackError::NotFound("thumbnail")
                    })?;
                Ok(PlaybackAsset::Blob {
                    data,
                    content_type: mime::IMAGE_JPEG.to_string(),
                    cache_control: THUMBNAIL_CACHE_CONTROL,
                })
            }
            PlaybackBackend::Public(_) => Ok(PlaybackAsset::Redirect(video.thumbnail_url)),
        }
    }
}
