use thiserror::Error;

use crate::infrastructure::storage::StorageError;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to start encoder: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("encoder exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("encoder produced no output at {0}")]
    MissingOutput(String),

    #[error("encoder task aborted: {0}")]
    Aborted(String),
}

/// Failure of one job attempt.
///
/// Permanent errors are dead-lettered immediately; everything else is retried
/// as a whole job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("malformed upload event: {0}")]
    Malformed(String),

    #[error("unsupported event schema version {0}")]
    UnsupportedVersion(u32),

    #[error("missing required fields: {0}")]
    MissingFields(String),

    #[error("invalid identifier {field}: {value:?}")]
    InvalidIdentifier { field: &'static str, value: String },

    #[error("unsupported rendition {0:?}")]
    UnsupportedRendition(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("encoding {label} failed: {source}")]
    Encode {
        label: String,
        #[source]
        source: EncodeError,
    },

    #[error("workspace I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to publish completion event: {0}")]
    Publish(String),
}

impl JobError {
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            JobError::Malformed(_)
                | JobError::UnsupportedVersion(_)
                | JobError::MissingFields(_)
                | JobError::InvalidIdentifier { .. }
                | JobError::UnsupportedRendition(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_permanent_and_transient() {
        assert!(JobError::MissingFields("upload_id".into()).is_permanent());
        assert!(JobError::UnsupportedRendition("4k".into()).is_permanent());
        assert!(!JobError::Publish("broker down".into()).is_permanent());
        assert!(
            !JobError::Encode {
                label: "720p".into(),
                source: EncodeError::MissingOutput("x".into()),
            }
            .is_permanent()
        );
        assert!(
            !JobError::Storage(StorageError::NotFound { path: "raw".into() }).is_permanent()
        );
    }
}
