use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError};

use super::error::JobError;
use super::profile::DEFAULT_LADDER;

/// Highest `schemaVersion` this worker understands.
pub const SCHEMA_VERSION: u32 = 1;

fn default_version() -> u32 {
    SCHEMA_VERSION
}

/// Accepts `null` where a collection or string is expected.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Identifiers become path segments in storage keys.
fn path_segment(value: &str) -> Result<(), ValidationError> {
    if value.contains('/') || value.contains('\\') || value == "." || value == ".." {
        return Err(ValidationError::new("path_segment"));
    }
    Ok(())
}

/// Inbound "video uploaded" message.
///
/// `uploadId`, `userId` and `rawVideoPath` are required; every other field
/// is optional and defaults to empty.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadEvent {
    #[serde(default = "default_version")]
    pub schema_version: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    #[validate(length(min = 1), custom(function = "path_segment"))]
    pub upload_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    #[validate(length(min = 1), custom(function = "path_segment"))]
    pub user_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    #[validate(length(min = 1))]
    pub raw_video_path: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub original_filename: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_private: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub resolutions: Vec<String>,
}

impl UploadEvent {
    /// Decodes and validates a message body. Every failure here is permanent.
    pub fn parse(payload: &[u8]) -> Result<Self, JobError> {
        let event: UploadEvent =
            serde_json::from_slice(payload).map_err(|e| JobError::Malformed(e.to_string()))?;

        if event.schema_version > SCHEMA_VERSION {
            return Err(JobError::UnsupportedVersion(event.schema_version));
        }

        if let Err(errors) = event.validate() {
            let field_errors = errors.field_errors();
            let mut missing: Vec<&str> = field_errors
                .iter()
                .filter(|(_, errs)| errs.iter().any(|e| e.code == "length"))
                .map(|(field, _)| field.as_ref())
                .collect();
            if !missing.is_empty() {
                missing.sort_unstable();
                return Err(JobError::MissingFields(missing.join(", ")));
            }

            let (field, value) = if field_errors.contains_key("upload_id") {
                ("upload_id", event.upload_id.clone())
            } else {
                ("user_id", event.user_id.clone())
            };
            return Err(JobError::InvalidIdentifier { field, value });
        }

        Ok(event)
    }

    /// Requested ladder in order, or the default ladder when none was given.
    /// Blank and repeated labels are dropped.
    pub fn ladder(&self) -> Vec<String> {
        let mut ladder: Vec<String> = Vec::with_capacity(self.resolutions.len());
        for label in self.resolutions.iter().map(|r| r.trim()) {
            if !label.is_empty() && !ladder.iter().any(|l| l == label) {
                ladder.push(label.to_string());
            }
        }
        if ladder.is_empty() {
            ladder = DEFAULT_LADDER.iter().map(|l| l.to_string()).collect();
        }
        ladder
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HlsLocation {
    pub master_url: String,
}

/// Outbound "video transcoded" message consumed by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    pub schema_version: u32,
    pub upload_id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category: String,
    pub is_private: bool,
    pub original_filename: String,
    pub raw_video_path: String,
    pub hls: HlsLocation,
    /// Empty when thumbnail generation failed.
    pub thumbnail_url: String,
    pub ready: bool,
}

impl CompletionEvent {
    pub fn from_upload(event: &UploadEvent, master_url: String, thumbnail_url: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            upload_id: event.upload_id.clone(),
            user_id: event.user_id.clone(),
            title: event.title.clone(),
            description: event.description.clone(),
            tags: event.tags.clone(),
            category: event.category.clone(),
            is_private: event.is_private,
            original_filename: event.original_filename.clone(),
            raw_video_path: event.raw_video_path.clone(),
            hls: HlsLocation { master_url },
            thumbnail_url: thumbnail_url.unwrap_or_default(),
            ready: true,
        }
    }
}

/// Published by the catalog when a video is deleted, so stored assets and
/// cached bytes can be purged.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VideoDeletedEvent {
    #[validate(length(min = 1), custom(function = "path_segment"))]
    pub upload_id: String,
    #[validate(length(min = 1), custom(function = "path_segment"))]
    pub user_id: String,
    #[serde(default)]
    pub raw_video_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_event() {
        let payload = br#"{
            "uploadId": "abc123",
            "userId": "u1",
            "username": "alice",
            "originalFilename": "clip.mov",
            "title": "Clip",
            "description": "desc",
            "tags": ["a", "b"],
            "category": "music",
            "isPrivate": true,
            "rawVideoPath": "raw/u1/abc123.mov",
            "resolutions": ["720p", "360p"]
        }"#;

        let event = UploadEvent::parse(payload).unwrap();
        assert_eq!(event.schema_version, 1);
        assert_eq!(event.upload_id, "abc123");
        assert!(event.is_private);
        assert_eq!(event.ladder(), vec!["720p", "360p"]);
    }

    #[test]
    fn missing_required_fields_are_permanent() {
        let err = UploadEvent::parse(br#"{"uploadId": "abc", "title": "x"}"#).unwrap_err();
        match &err {
            JobError::MissingFields(fields) => assert_eq!(fields, "raw_video_path, user_id"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_permanent());
    }

    #[test]
    fn nulls_and_garbage() {
        let event = UploadEvent::parse(
            br#"{"uploadId":"a","userId":"u","rawVideoPath":"r","tags":null,"resolutions":null}"#,
        )
        .unwrap();
        assert!(event.tags.is_empty());
        assert_eq!(event.ladder(), DEFAULT_LADDER.to_vec());

        assert!(matches!(UploadEvent::parse(b"not json"), Err(JobError::Malformed(_))));
    }

    #[test]
    fn rejects_future_versions_and_path_like_ids() {
        let err = UploadEvent::parse(
            br#"{"schemaVersion":2,"uploadId":"a","userId":"u","rawVideoPath":"r"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, JobError::UnsupportedVersion(2)));

        let err =
            UploadEvent::parse(br#"{"uploadId":"../x","userId":"u","rawVideoPath":"r"}"#).unwrap_err();
        assert!(matches!(err, JobError::InvalidIdentifier { field: "upload_id", .. }));
    }

    #[test]
    fn ladder_keeps_order_and_drops_duplicates() {
        let event = UploadEvent::parse(
            br#"{"uploadId":"a","userId":"u","rawVideoPath":"r","resolutions":["360p"," 1080p","360p",""]}"#,
        )
        .unwrap();
        assert_eq!(event.ladder(), vec!["360p", "1080p"]);
    }

    #[test]
    fn completion_event_wire_format() {
        let upload = UploadEvent::parse(br#"{"uploadId":"a","userId":"u","rawVideoPath":"r"}"#).unwrap();
        let event = CompletionEvent::from_upload(&upload, "/hls/u/a/master.m3u8".into(), None);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["hls"]["masterUrl"], "/hls/u/a/master.m3u8");
        assert_eq!(json["thumbnailUrl"], "");
        assert_eq!(json["ready"], true);
        assert_eq!(json["uploadId"], "a");
        assert_eq!(json["rawVideoPath"], "r");
    }
}
