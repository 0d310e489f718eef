use std::sync::Arc;

use crate::modules::playback::service::PlaybackService;

#[derive(Clone)]
pub struct AppState {
    pub playback: Arc<PlaybackService>,
}

impl AppState {
    pub fn new(playback: Arc<PlaybackService>) -> Self {
        Self { playback }
    }
}
