use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use super::error::EncodeError;
use super::profile::RenditionSpec;
use crate::common::layout::VARIANT_MANIFEST;

/// Target duration of each HLS segment, in seconds.
pub const SEGMENT_SECONDS: u32 = 6;

/// External encoding capability. Calls block until the encoder exits, so
/// async callers run them on the blocking pool.
pub trait Encoder: Send + Sync {
    /// Writes `index.m3u8` plus its media segments into `output_dir`.
    fn encode(&self, input: &Path, output_dir: &Path, profile: &RenditionSpec) -> Result<(), EncodeError>;

    /// Writes a single JPEG frame taken near the start of `input`.
    fn extract_thumbnail(&self, input: &Path, output: &Path) -> Result<(), EncodeError>;
}

#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    bin: String,
}

impl FfmpegEncoder {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    fn run(&self, args: &[String]) -> Result<(), EncodeError> {
        debug!(bin = %self.bin, ?args, "Running encoder");
        let output = Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()?;

        if !output.status.success() {
            return Err(EncodeError::Failed {
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr, 20),
            });
        }
        Ok(())
    }
}

impl Encoder for FfmpegEncoder {
    fn encode(&self, input: &Path, output_dir: &Path, profile: &RenditionSpec) -> Result<(), EncodeError> {
        self.run(&hls_args(input, output_dir, profile))?;

        let playlist = output_dir.join(VARIANT_MANIFEST);
        if !playlist.is_file() {
            return Err(EncodeError::MissingOutput(playlist.display().to_string()));
        }
        Ok(())
    }

    fn extract_thumbnail(&self, input: &Path, output: &Path) -> Result<(), EncodeError> {
        self.run(&thumbnail_args(input, output))?;

        if !output.is_file() {
            return Err(EncodeError::MissingOutput(output.display().to_string()));
        }
        Ok(())
    }
}

/// ffmpeg arguments producing one VOD HLS rendition.
pub fn hls_args(input: &Path, output_dir: &Path, profile: &RenditionSpec) -> Vec<String> {
    let video_kbps = profile.video_bitrate_kbps;
    let gop = SEGMENT_SECONDS * 2 * 24;

    vec![
        "-hide_banner".into(),
        "-y".into(),
        "-i".into(),
        input.display().to_string(),
        "-vf".into(),
        format!("scale=-2:{}", profile.height),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "veryfast".into(),
        "-profile:v".into(),
        "main".into(),
        "-b:v".into(),
        format!("{}k", video_kbps),
        "-maxrate".into(),
        format!("{}k", video_kbps * 107 / 100),
        "-bufsize".into(),
        format!("{}k", video_kbps * 3 / 2),
        "-g".into(),
        gop.to_string(),
        "-sc_threshold".into(),
        "0".into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        format!("{}k", profile.audio_bitrate_kbps),
        "-ac".into(),
        "2".into(),
        "-f".into(),
        "hls".into(),
        "-hls_time".into(),
        SEGMENT_SECONDS.to_string(),
        "-hls_playlist_type".into(),
        "vod".into(),
        "-hls_segment_filename".into(),
        output_dir.join("segment_%03d.ts").display().to_string(),
        output_dir.join(VARIANT_MANIFEST).display().to_string(),
    ]
}

/// ffmpeg arguments grabbing one frame one second into the source.
pub fn thumbnail_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-y".into(),
        "-ss".into(),
        "1".into(),
        "-i".into(),
        input.display().to_string(),
        "-frames:v".into(),
        "1".into(),
        "-q:v".into(),
        "2".into(),
        output.display().to_string(),
    ]
}

fn stderr_tail(stderr: &[u8], lines: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let collected: Vec<&str> = text.lines().rev().take(lines).collect();
    collected.into_iter().rev().collect::<Vec<_>>().join("\n")
}
