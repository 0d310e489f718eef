use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{ObjectStore, StorageError};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

/// In-memory object store used by tests and local runs without MinIO.
///
/// Counts `get` calls so callers can assert how often the backing store was
/// actually hit.
#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
    gets: Arc<AtomicUsize>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, path: &str, data: impl Into<Bytes>, content_type: &str) {
        self.objects.write().await.insert(
            path.to_string(),
            StoredObject {
                data: data.into(),
                content_type: content_type.to_string(),
            },
        );
    }

    pub async fn object(&self, path: &str) -> Option<StoredObject> {
        self.objects.read().await.get(path).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, path: &str) -> Result<Bytes, StorageError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.objects
            .read()
            .await
            .get(path)
            .map(|obj| obj.data.clone())
            .ok_or_else(|| StorageError::NotFound {
                path: path.to_string(),
            })
    }

    async fn put(&self, path: &str, body: Bytes, content_type: &str) -> Result<(), StorageError> {
        self.insert(path, body, content_type).await;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.objects.write().await.remove(path);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .objects
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delete_prefix_removes_only_matching_keys() {
        let store = InMemoryObjectStore::new();
        store.insert("hls/u1/a/master.m3u8", "m", "text/plain").await;
        store.insert("hls/u1/a/720p/index.m3u8", "v", "text/plain").await;
        store.insert("hls/u1/ab/master.m3u8", "other", "text/plain").await;

        let removed = store.delete_prefix("hls/u1/a/").await.unwrap();

        assert_eq!(removed, 2);
        assert_eq!(store.keys().await, vec!["hls/u1/ab/master.m3u8".to_string()]);
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let store = InMemoryObjectStore::new();
        let err = store.get("nope").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
        assert_eq!(store.get_count(), 1);
    }
}
