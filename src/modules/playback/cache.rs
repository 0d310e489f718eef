use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::infrastructure::cache::{CacheStore, escape_glob};
use crate::infrastructure::storage::{ObjectStore, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Segment,
    Thumbnail,
}

impl CacheKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Segment => "segment",
            CacheKind::Thumbnail => "thumbnail",
        }
    }
}

pub fn cache_key(kind: CacheKind, upload_id: &str, blob_path: &str) -> String {
    format!("playback:{}:{}:{}", kind.as_str(), upload_id, blob_path)
}

/// Pattern covering every cached entry of one upload, of any kind. The id is
/// escaped so it only ever matches itself.
pub fn upload_pattern(upload_id: &str) -> String {
    format!("playback:*:{}:*", escape_glob(upload_id))
}

/// Read-through cache in front of the object store.
///
/// Without a cache store every call goes straight to storage. Cache read and
/// write failures are logged and never surface to the caller.
#[derive(Clone)]
pub struct SegmentCache {
    cache: Option<Arc<dyn CacheStore>>,
    store: Arc<dyn ObjectStore>,
}

impl SegmentCache {
    pub fn new(cache: Option<Arc<dyn CacheStore>>, store: Arc<dyn ObjectStore>) -> Self {
        Self { cache, store }
    }

    pub fn is_enabled(&self) -> bool {
        self.cache.is_some()
    }

    pub async fn get_or_fetch(
        &self,
        kind: CacheKind,
        upload_id: &str,
        blob_path: &str,
    ) -> Result<Bytes, StorageError> {
        let Some(cache) = &self.cache else {
            return self.store.get(blob_path).await;
        };

        let key = cache_key(kind, upload_id, blob_path);
        match cache.get(&key).await {
            Ok(Some(hit)) => {
                debug!(key = %key, "Cache hit");
                return Ok(hit);
            }
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Cache get failed, reading storage"),
        }

        let data = self.store.get(blob_path).await?;
        if let Err(e) = cache.set(&key, &data).await {
            warn!(key = %key, error = %e, "Cache set failed");
        }
        Ok(data)
    }

    /// Drops every entry for `upload_id`. Returns how many were removed.
    pub async fn purge(&self, upload_id: &str) -> usize {
        let Some(cache) = &self.cache else {
            return 0;
        };
        match cache.delete_matching(&upload_pattern(upload_id)).await {
            Ok(n) => n,
            Err(e) => {
                warn!(upload_id, error = %e, "Cache purge failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::cache::{CacheError, MemoryCacheStore};
    use crate::infrastructure::storage::memory::InMemoryObjectStore;
    use async_trait::async_trait;

    struct BrokenCache;

    #[async_trait]
    impl CacheStore for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
            Err(CacheError::Timeout)
        }

        async fn set(&self, _key: &str, _value: &[u8]) -> Result<(), CacheError> {
            Err(CacheError::Timeout)
        }

        async fn delete_matching(&self, _pattern: &str) -> Result<usize, CacheError> {
            Err(CacheError::Timeout)
        }
    }

    #[test]
    fn key_is_kind_upload_path() {
        assert_eq!(
            cache_key(CacheKind::Segment, "abc", "hls/u1/abc/720p/segment_000.ts"),
            "playback:segment:abc:hls/u1/abc/720p/segment_000.ts"
        );
        assert_eq!(upload_pattern("abc"), "playback:*:abc:*");
        assert_eq!(upload_pattern("a*"), "playback:*:a\\*:*");
    }

    #[tokio::test]
    async fn purge_of_wildcard_id_spares_other_uploads() {
        let memory = Arc::new(MemoryCacheStore::new());
        memory.set("playback:segment:other:hls/u1/other/720p/segment_000.ts", b"x").await.unwrap();
        let cache = SegmentCache::new(Some(memory.clone()), Arc::new(InMemoryObjectStore::new()));

        assert_eq!(cache.purge("*").await, 0);
        assert_eq!(memory.len().await, 1);
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let store = InMemoryObjectStore::new();
        store.insert("a/seg.ts", &b"bytes"[..], "video/MP2T").await;
        let cache = SegmentCache::new(Some(Arc::new(MemoryCacheStore::new())), Arc::new(store.clone()));

        for _ in 0..2 {
            let data = cache.get_or_fetch(CacheKind::Segment, "abc", "a/seg.ts").await.unwrap();
            assert_eq!(&data[..], b"bytes");
        }
        assert_eq!(store.get_count(), 1);
    }

    #[tokio::test]
    async fn broken_cache_falls_back_to_storage() {
        let store = InMemoryObjectStore::new();
        store.insert("a/seg.ts", &b"bytes"[..], "video/MP2T").await;
        let cache = SegmentCache::new(Some(Arc::new(BrokenCache)), Arc::new(store.clone()));

        let data = cache.get_or_fetch(CacheKind::Segment, "abc", "a/seg.ts").await.unwrap();
        assert_eq!(&data[..], b"bytes");
        assert_eq!(cache.purge("abc").await, 0);
    }

    #[tokio::test]
    async fn misses_are_not_cached() {
        let store = InMemoryObjectStore::new();
        let memory = Arc::new(MemoryCacheStore::new());
        let cache = SegmentCache::new(Some(memory.clone()), Arc::new(store));

        let err = cache.get_or_fetch(CacheKind::Thumbnail, "abc", "thumbnails/u1/abc.jpg").await;
        assert!(matches!(err, Err(StorageError::NotFound { .. })));
        assert!(memory.is_empty().await);
    }
}
