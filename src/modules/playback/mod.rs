use axum::Router;
use axum::routing::get;

use crate::state::AppState;

pub mod cache;
pub mod dto;
pub mod error;
pub mod handler;
pub mod model;
pub mod purge;
pub mod repository;
pub mod resolver;
pub mod rewriter;
pub mod service;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/videos/{upload_id}", get(handler::get_descriptor))
        .route("/videos/{upload_id}/master.m3u8", get(handler::get_master))
        .route("/videos/{upload_id}/thumbnail.jpg", get(handler::get_thumbnail))
        .route("/videos/{upload_id}/{rendition}/index.m3u8", get(handler::get_variant))
        .route("/videos/{upload_id}/{rendition}/{segment}", get(handler::get_segment))
}
