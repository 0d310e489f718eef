//! StreamHive media service: the HLS transcoding worker and the playback
//! proxy that serves its output.

pub mod app;
pub mod common;
pub mod config;
pub mod docs;
pub mod infrastructure;
pub mod modules;
pub mod routes;
pub mod state;
pub mod workers;
