pub mod playback;
pub mod transcode;
