use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::common::response::{ApiResponse, ApiSuccess};
use crate::modules::playback::dto::DescriptorResponse;
use crate::modules::playback::error::PlaybackError;
use crate::modules::playback::service::PlaybackAsset;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/playback/videos/{upload_id}",
    params(
        ("upload_id" = String, Path, description = "Upload ID")
    ),
    responses(
        (status = 200, description = "Video descriptor", body = ApiResponse<DescriptorResponse>),
        (status = 404, description = "Not Found"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Playback"
)]
pub async fn get_descriptor(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> impl IntoResponse {
    match state.playback.get_descriptor(&upload_id).await {
        Ok(res) => ApiSuccess(ApiResponse::success(res, "Video retrieved successfully"), StatusCode::OK).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Master manifest with variant references normalized.
#[utoipa::path(
    get,
    path = "/playback/videos/{upload_id}/master.m3u8",
    params(
        ("upload_id" = String, Path, description = "Upload ID")
    ),
    responses(
        (status = 200, description = "Master manifest", content_type = "application/vnd.apple.mpegurl"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Transcoding not finished"),
        (status = 502, description = "Upstream error")
    ),
    tag = "Playback"
)]
pub async fn get_master(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> Result<PlaybackAsset, PlaybackError> {
    state.playback.get_master(&upload_id).await
}

#[utoipa::path(
    get,
    path = "/playback/videos/{upload_id}/{rendition}/index.m3u8",
    params(
        ("upload_id" = String, Path, description = "Upload ID"),
        ("rendition" = String, Path, description = "One of 1080p, 720p, 480p, 360p")
    ),
    responses(
        (status = 200, description = "Variant manifest", content_type = "application/vnd.apple.mpegurl"),
        (status = 400, description = "Invalid rendition"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Transcoding not finished"),
        (status = 502, description = "Upstream error")
    ),
    tag = "Playback"
)]
pub async fn get_variant(
    State(state): State<AppState>,
    Path((upload_id, rendition)): Path<(String, String)>,
) -> Result<PlaybackAsset, PlaybackError> {
    state.playback.get_variant(&upload_id, &rendition).await
}

/// Media segment; cached in private mode, proxied in public mode.
#[utoipa::path(
    get,
    path = "/playback/videos/{upload_id}/{rendition}/{segment}",
    params(
        ("upload_id" = String, Path, description = "Upload ID"),
        ("rendition" = String, Path, description = "One of 1080p, 720p, 480p, 360p"),
        ("segment" = String, Path, description = "Segment file name (.ts or .m4s)")
    ),
    responses(
        (status = 200, description = "Segment bytes"),
        (status = 400, description = "Invalid rendition or segment"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Transcoding not finished"),
        (status = 502, description = "Upstream error")
    ),
    tag = "Playback"
)]
pub async fn get_segment(
    State(state): State<AppState>,
    Path((upload_id, rendition, segment)): Path<(String, String, String)>,
) -> Result<PlaybackAsset, PlaybackError> {
    state.playback.get_segment(&upload_id, &rendition, &segment).await
}

#[utoipa::path(
    get,
    path = "/playback/videos/{upload_id}/thumbnail.jpg",
    params(
        ("upload_id" = String, Path, description = "Upload ID")
    ),
    responses(
        (status = 200, description = "Thumbnail", content_type = "image/jpeg"),
        (status = 302, description = "Redirect to public thumbnail"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Transcoding not finished")
    ),
    tag = "Playback"
)]
pub async fn get_thumbnail(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> Result<PlaybackAsset, PlaybackError> {
    state.playback.get_thumbnail(&upload_id).await
}
