use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::common::response::ApiError;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("master manifest not ready")]
    NotReady,

    #[error("invalid {0}")]
    InvalidParameter(&'static str),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    pub fn status(&self) -> StatusCode {
        match self {
            PlaybackError::NotFound(_) => StatusCode::NOT_FOUND,
            PlaybackError::NotReady => StatusCode::CONFLICT,
            PlaybackError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            PlaybackError::Upstream(_) => StatusCode::BAD_GATEWAY,
            PlaybackError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PlaybackError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // Upstream and catalog details stay in the logs.
            PlaybackError::Upstream(detail) => {
                error!(error = %detail, "Upstream fetch failed");
                "upstream error".to_string()
            }
            PlaybackError::Internal(detail) => {
                error!(error = %detail, "Playback internal error");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        ApiError(message, status).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_condition_has_a_distinct_status() {
        let statuses = [
            PlaybackError::NotFound("video").status(),
            PlaybackError::NotReady.status(),
            PlaybackError::InvalidParameter("rendition").status(),
            PlaybackError::Upstream("x".into()).status(),
            PlaybackError::Internal("x".into()).status(),
        ];
        for (i, a) in statuses.iter().enumerate() {
            for b in &statuses[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
