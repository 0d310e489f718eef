mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{COMPLETION_QUEUE, RecordingPublisher, StubEncoder, pipeline, upload_event};
use streamhive_media::infrastructure::storage::memory::InMemoryObjectStore;
use streamhive_media::modules::transcode::consumer::{JobConsumer, JobState, RetryPolicy};
use streamhive_media::modules::transcode::error::JobError;

async fn raw_store_with(path: &str) -> InMemoryObjectStore {
    let raw = InMemoryObjectStore::new();
    raw.insert(path, &b"source-bytes"[..], "video/mp4").await;
    raw
}

#[tokio::test]
async fn publishes_ladder_in_requested_order() {
    let raw = raw_store_with("u1/abc123.mp4").await;
    let processed = InMemoryObjectStore::new();
    let events = Arc::new(RecordingPublisher::new());
    let pipeline = pipeline(&raw, &processed, Arc::new(StubEncoder::new()), events.clone());

    let completion = pipeline
        .run(&upload_event("abc123", "u1", &["720p", "360p"]))
        .await
        .unwrap();

    let keys = processed.keys().await;
    for expected in [
        "hls/u1/abc123/720p/index.m3u8",
        "hls/u1/abc123/360p/index.m3u8",
        "hls/u1/abc123/720p/segment_000.ts",
        "hls/u1/abc123/master.m3u8",
        "thumbnails/u1/abc123.jpg",
    ] {
        assert!(keys.contains(&expected.to_string()), "missing {expected}: {keys:?}");
    }
    assert!(!keys.iter().any(|k| k.contains("1080p") || k.contains("480p")));

    let master = processed.object("hls/u1/abc123/master.m3u8").await.unwrap();
    assert_eq!(master.content_type, "application/vnd.apple.mpegurl");
    let body = String::from_utf8(master.data.to_vec()).unwrap();
    let first = body.find("BANDWIDTH=2928000").unwrap();
    let second = body.find("BANDWIDTH=864000").unwrap();
    assert!(first < second);
    assert!(body.contains("720p/index.m3u8\n"));
    assert!(body.contains("360p/index.m3u8\n"));

    assert_eq!(completion.hls.master_url, "/hls/u1/abc123/master.m3u8");
    assert_eq!(completion.thumbnail_url, "/thumbnails/u1/abc123.jpg");
    assert!(completion.ready);

    let messages = events.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, COMPLETION_QUEUE);
    let wire: serde_json::Value = serde_json::from_slice(&messages[0].1).unwrap();
    assert_eq!(wire["hls"]["masterUrl"], "/hls/u1/abc123/master.m3u8");
    assert_eq!(wire["uploadId"], "abc123");
    assert_eq!(wire["ready"], true);
}

#[tokio::test]
async fn failed_rendition_publishes_nothing() {
    let raw = raw_store_with("u1/abc123.mp4").await;
    let processed = InMemoryObjectStore::new();
    let events = Arc::new(RecordingPublisher::new());
    let encoder = Arc::new(StubEncoder::failing_on(2));
    let pipeline = pipeline(&raw, &processed, encoder.clone(), events.clone());

    let err = pipeline
        .run(&upload_event("abc123", "u1", &["720p", "360p"]))
        .await
        .unwrap_err();

    assert!(matches!(&err, JobError::Encode { label, .. } if label == "360p"));
    assert!(!err.is_permanent());
    assert_eq!(encoder.encodes(), 2);
    assert!(processed.object("hls/u1/abc123/master.m3u8").await.is_none());
    assert!(events.messages().is_empty());
}

#[tokio::test]
async fn rerun_writes_the_same_keys() {
    let raw = raw_store_with("u1/abc123.mp4").await;
    let processed = InMemoryObjectStore::new();
    let events = Arc::new(RecordingPublisher::new());
    let pipeline = pipeline(&raw, &processed, Arc::new(StubEncoder::new()), events.clone());
    let event = upload_event("abc123", "u1", &["480p"]);

    pipeline.run(&event).await.unwrap();
    let first = processed.keys().await;
    pipeline.run(&event).await.unwrap();
    let second = processed.keys().await;

    assert_eq!(first, second);
    assert_eq!(events.messages().len(), 2);
}

#[tokio::test]
async fn thumbnail_failure_is_not_fatal() {
    let raw = raw_store_with("u1/abc123.mp4").await;
    let processed = InMemoryObjectStore::new();
    let events = Arc::new(RecordingPublisher::new());
    let pipeline = pipeline(&raw, &processed, Arc::new(StubEncoder::without_thumbnail()), events.clone());

    let completion = pipeline
        .run(&upload_event("abc123", "u1", &["360p"]))
        .await
        .unwrap();

    assert_eq!(completion.thumbnail_url, "");
    assert!(processed.object("thumbnails/u1/abc123.jpg").await.is_none());
    assert!(processed.object("hls/u1/abc123/master.m3u8").await.is_some());
}

#[tokio::test]
async fn broker_failure_fails_the_job() {
    let raw = raw_store_with("u1/abc123.mp4").await;
    let processed = InMemoryObjectStore::new();
    let pipeline = pipeline(
        &raw,
        &processed,
        Arc::new(StubEncoder::new()),
        Arc::new(RecordingPublisher::broken()),
    );

    let err = pipeline
        .run(&upload_event("abc123", "u1", &["360p"]))
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::Publish(_)));
    assert!(!err.is_permanent());
}

#[tokio::test]
async fn unknown_rendition_is_rejected_before_download() {
    let raw = InMemoryObjectStore::new();
    let processed = InMemoryObjectStore::new();
    let encoder = Arc::new(StubEncoder::new());
    let pipeline = pipeline(&raw, &processed, encoder.clone(), Arc::new(RecordingPublisher::new()));

    let err = pipeline
        .run(&upload_event("abc123", "u1", &["720p", "4k"]))
        .await
        .unwrap_err();
    assert!(err.is_permanent());
    assert_eq!(raw.get_count(), 0);
    assert_eq!(encoder.encodes(), 0);
}

fn policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base: Duration::from_secs(2),
        jitter: false,
    }
}

#[tokio::test]
async fn consumer_drives_the_state_machine() {
    let raw = raw_store_with("u1/abc123.mp4").await;
    let processed = InMemoryObjectStore::new();
    let pipeline = Arc::new(pipeline(
        &raw,
        &processed,
        Arc::new(StubEncoder::new()),
        Arc::new(RecordingPublisher::new()),
    ));
    let jobs = JobConsumer::new(pipeline, policy());

    let ok = serde_json::to_vec(&upload_event("abc123", "u1", &["360p"])).unwrap();
    assert_eq!(jobs.process(&ok, 1).await, JobState::Succeeded { attempt: 1 });

    let missing_user = br#"{"uploadId":"abc123","rawVideoPath":"u1/abc123.mp4"}"#;
    assert!(matches!(
        jobs.process(missing_user, 1).await,
        JobState::DeadLettered { attempt: 1, .. }
    ));

    let missing_source = serde_json::to_vec(&upload_event("zzz", "u1", &["360p"])).unwrap();
    assert_eq!(
        jobs.process(&missing_source, 1).await,
        JobState::Retrying {
            attempt: 1,
            delay: Duration::from_secs(2)
        }
    );
    assert!(matches!(
        jobs.process(&missing_source, 3).await,
        JobState::DeadLettered { attempt: 3, .. }
    ));
}
