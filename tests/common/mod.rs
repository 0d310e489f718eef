#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use streamhive_media::infrastructure::queue::rabbitmq::EventPublisher;
use streamhive_media::infrastructure::storage::memory::InMemoryObjectStore;
use streamhive_media::modules::transcode::encoder::Encoder;
use streamhive_media::modules::transcode::error::EncodeError;
use streamhive_media::modules::transcode::events::UploadEvent;
use streamhive_media::modules::transcode::pipeline::TranscodePipeline;
use streamhive_media::modules::transcode::profile::RenditionSpec;
use streamhive_media::modules::transcode::publisher::{ResultPublisher, UrlPolicy};

pub const COMPLETION_QUEUE: &str = "video_transcoded";

/// Writes a one-segment playlist per rendition instead of running ffmpeg.
#[derive(Default)]
pub struct StubEncoder {
    fail_on: Option<usize>,
    no_thumbnail: bool,
    encodes: AtomicUsize,
}

impl StubEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the `n`th encode call (1-based).
    pub fn failing_on(n: usize) -> Self {
        Self {
            fail_on: Some(n),
            ..Self::default()
        }
    }

    pub fn without_thumbnail() -> Self {
        Self {
            no_thumbnail: true,
            ..Self::default()
        }
    }

    pub fn encodes(&self) -> usize {
        self.encodes.load(Ordering::SeqCst)
    }
}

impl Encoder for StubEncoder {
    fn encode(&self, input: &Path, output_dir: &Path, profile: &RenditionSpec) -> Result<(), EncodeError> {
        let n = self.encodes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(n) {
            return Err(EncodeError::Failed {
                status: "exit status: 1".into(),
                stderr: format!("cannot encode {}", profile.label),
            });
        }
        assert!(input.is_file(), "source must be downloaded before encoding");

        std::fs::write(
            output_dir.join("index.m3u8"),
            "#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\nsegment_000.ts\n#EXT-X-ENDLIST\n",
        )?;
        std::fs::write(output_dir.join("segment_000.ts"), profile.label.as_bytes())?;
        Ok(())
    }

    fn extract_thumbnail(&self, _input: &Path, output: &Path) -> Result<(), EncodeError> {
        if self.no_thumbnail {
            return Err(EncodeError::MissingOutput(output.display().to_string()));
        }
        std::fs::write(output, b"\xFF\xD8\xFF")?;
        Ok(())
    }
}

/// Captures published messages; optionally refuses every publish.
#[derive(Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<(String, Vec<u8>)>>,
    broken: bool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<(String, Vec<u8>)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish_json(&self, queue: &str, payload: &[u8]) -> anyhow::Result<()> {
        if self.broken {
            anyhow::bail!("broker unavailable");
        }
        self.messages
            .lock()
            .unwrap()
            .push((queue.to_string(), payload.to_vec()));
        Ok(())
    }
}

pub fn pipeline(
    raw: &InMemoryObjectStore,
    processed: &InMemoryObjectStore,
    encoder: Arc<StubEncoder>,
    events: Arc<RecordingPublisher>,
) -> TranscodePipeline {
    let publisher = ResultPublisher::new(
        Arc::new(processed.clone()),
        events,
        encoder.clone(),
        UrlPolicy::Relative,
        COMPLETION_QUEUE,
    );
    TranscodePipeline::new(Arc::new(raw.clone()), encoder, publisher)
}

pub fn upload_event(upload_id: &str, user_id: &str, resolutions: &[&str]) -> UploadEvent {
    let body = serde_json::json!({
        "uploadId": upload_id,
        "userId": user_id,
        "username": "alice",
        "originalFilename": "clip.mp4",
        "title": "Clip",
        "rawVideoPath": format!("{}/{}.mp4", user_id, upload_id),
        "resolutions": resolutions,
    });
    UploadEvent::parse(body.to_string().as_bytes()).unwrap()
}
