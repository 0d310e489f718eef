use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info};

use super::encoder::Encoder;
use super::error::{EncodeError, JobError};
use super::profile::RenditionSpec;
use super::workspace::TranscodeWorkspace;

/// One rendition that finished encoding.
#[derive(Debug, Clone)]
pub struct BuiltRendition {
    pub label: &'static str,
    pub elapsed: Duration,
}

/// Maps requested labels to table entries. Any unknown label rejects the
/// whole ladder, since there is no profile to encode it with.
pub fn resolve_ladder(labels: &[String]) -> Result<Vec<&'static RenditionSpec>, JobError> {
    labels
        .iter()
        .map(|label| {
            RenditionSpec::lookup(label).ok_or_else(|| JobError::UnsupportedRendition(label.clone()))
        })
        .collect()
}

/// Drives the encoder once per rendition, in ladder order. The first failure
/// aborts the ladder; nothing built so far is published.
pub struct LadderBuilder {
    encoder: Arc<dyn Encoder>,
}

impl LadderBuilder {
    pub fn new(encoder: Arc<dyn Encoder>) -> Self {
        Self { encoder }
    }

    pub async fn build(
        &self,
        workspace: &TranscodeWorkspace,
        upload_id: &str,
        ladder: &[&'static RenditionSpec],
    ) -> Result<Vec<BuiltRendition>, JobError> {
        let input = workspace.input_path();
        let mut built = Vec::with_capacity(ladder.len());

        for spec in ladder {
            let output_dir = workspace.rendition_dir(spec.label);
            tokio::fs::create_dir_all(&output_dir).await?;

            let start = Instant::now();
            let result = self.encode_blocking(&input, &output_dir, spec).await;
            let elapsed = start.elapsed();

            match result {
                Ok(()) => {
                    info!(
                        upload_id,
                        rendition = spec.label,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "🎞️ Rendition done"
                    );
                    built.push(BuiltRendition {
                        label: spec.label,
                        elapsed,
                    });
                }
                Err(source) => {
                    error!(
                        upload_id,
                        rendition = spec.label,
                        elapsed_ms = elapsed.as_millis() as u64,
                        error = %source,
                        "❌ Rendition failed"
                    );
                    return Err(JobError::Encode {
                        label: spec.label.to_string(),
                        source,
                    });
                }
            }
        }

        Ok(built)
    }

    async fn encode_blocking(
        &self,
        input: &Path,
        output_dir: &Path,
        spec: &'static RenditionSpec,
    ) -> Result<(), EncodeError> {
        let encoder = Arc::clone(&self.encoder);
        let input = input.to_path_buf();
        let output_dir = output_dir.to_path_buf();

        tokio::task::spawn_blocking(move || encoder.encode(&input, &output_dir, spec))
            .await
            .map_err(|e| EncodeError::Aborted(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_keeps_order_and_rejects_unknown() {
        let specs = resolve_ladder(&["480p".to_string(), "1080p".to_string()]).unwrap();
        assert_eq!(specs.iter().map(|s| s.label).collect::<Vec<_>>(), vec!["480p", "1080p"]);

        let err = resolve_ladder(&["720p".to_string(), "4k".to_string()]).unwrap_err();
        assert!(matches!(err, JobError::UnsupportedRendition(ref l) if l == "4k"));
    }
}
