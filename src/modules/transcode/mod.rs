//! Upload-to-HLS transcoding: consumes "video uploaded" events, encodes the
//! rendition ladder, writes the master manifest, publishes the result.

pub mod consumer;
pub mod encoder;
pub mod error;
pub mod events;
pub mod ladder;
pub mod manifest;
pub mod pipeline;
pub mod profile;
pub mod publisher;
pub mod workspace;
