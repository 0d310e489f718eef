use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use bytes::Bytes;
use tracing::{debug, info};

use super::{ObjectStore, StorageError};
use crate::config::settings::StorageConfig;

#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
    pub bucket: String,
}

impl StorageService {
    pub fn new(
        endpoint: &str,
        region: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
        operation_timeout: Duration,
    ) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(operation_timeout)
                    .build(),
            )
            .force_path_style(true) // Required for MinIO
            .build();

        let client = Client::from_conf(config);

        info!(endpoint, bucket, "✅ S3 client configured");

        Self {
            client,
            bucket: bucket.to_string(),
        }
    }

    /// Builds a client from config, or `None` when credentials are missing.
    pub fn from_config(config: &StorageConfig, bucket: &str, timeout: Duration) -> Option<Self> {
        if !config.has_credentials() {
            return None;
        }
        let endpoint = config.endpoint_url()?;
        Some(Self::new(
            &endpoint,
            &config.region,
            bucket,
            config.access_key.as_deref()?,
            config.secret_key.as_deref()?,
            timeout,
        ))
    }

    /// Same connection, different bucket.
    pub fn with_bucket(&self, bucket: &str) -> Self {
        Self {
            client: self.client.clone(),
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for StorageService {
    async fn get(&self, path: &str) -> Result<Bytes, StorageError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StorageError::NotFound {
                        path: path.to_string(),
                    }
                } else {
                    StorageError::Get {
                        path: path.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let data = resp.body.collect().await.map_err(|e| StorageError::Get {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        debug!(bucket = %self.bucket, path, "Downloaded object");
        Ok(data.into_bytes())
    }

    async fn put(&self, path: &str, body: Bytes, content_type: &str) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Put {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        debug!(bucket = %self.bucket, path, content_type, "Uploaded object");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| StorageError::Delete {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| StorageError::List {
                    prefix: prefix.to_string(),
                    reason: e.to_string(),
                })?;

            keys.extend(page.contents().iter().filter_map(|obj| obj.key().map(str::to_string)));

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(keys)
    }
}
