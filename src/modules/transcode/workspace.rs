use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::common::layout::MASTER_MANIFEST;

/// Scratch directory owned by exactly one job attempt.
///
/// The tree is removed by [`TranscodeWorkspace::release`] or, on any other
/// exit path, when the value is dropped.
pub struct TranscodeWorkspace {
    dir: TempDir,
    input_name: String,
}

impl TranscodeWorkspace {
    pub fn create(upload_id: &str, raw_video_path: &str) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("transcoder-{}-", sanitize(upload_id)))
            .tempdir()?;

        let extension = Path::new(raw_video_path)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("mp4");

        std::fs::create_dir_all(dir.path().join("hls"))?;
        debug!(path = %dir.path().display(), "Workspace created");

        Ok(Self {
            dir,
            input_name: format!("input.{}", extension),
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn input_path(&self) -> PathBuf {
        self.dir.path().join(&self.input_name)
    }

    /// Local mirror of `hls/<userId>/<uploadId>/`.
    pub fn output_root(&self) -> PathBuf {
        self.dir.path().join("hls")
    }

    pub fn rendition_dir(&self, label: &str) -> PathBuf {
        self.output_root().join(label)
    }

    pub fn master_path(&self) -> PathBuf {
        self.output_root().join(MASTER_MANIFEST)
    }

    pub fn thumbnail_path(&self) -> PathBuf {
        self.dir.path().join("thumb.jpg")
    }

    pub fn release(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!(path = %path.display(), error = %e, "Failed to remove workspace");
        } else {
            debug!(path = %path.display(), "Workspace removed");
        }
    }
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(64)
        .collect()
}
