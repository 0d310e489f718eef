use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::{AsyncCommands, Client, ErrorKind, RedisError, aio::ConnectionManager};
use tracing::{debug, info};

use crate::infrastructure::cache::{CacheError, CacheStore};

/// Upper bound on any single Redis round trip.
const OP_TIMEOUT: Duration = Duration::from_secs(2);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Process-wide Redis handle. Every clone shares one multiplexed
/// connection, which the manager re-establishes after a drop.
#[derive(Clone)]
pub struct RedisService {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl RedisService {
    pub async fn new(connection_string: &str, ttl_secs: u64) -> Result<Self, RedisError> {
        let client = Client::open(connection_string)?;
        let conn = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| RedisError::from((ErrorKind::IoError, "timed out connecting to Redis")))??;

        info!("✅ Connected to Redis");
        Ok(Self { conn, ttl_secs })
    }

    pub fn get_conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl CacheStore for RedisService {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let mut conn = self.get_conn();
        let value = tokio::time::timeout(OP_TIMEOUT, conn.get::<_, Option<Vec<u8>>>(key))
            .await
            .map_err(|_| CacheError::Timeout)??;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        let mut conn = self.get_conn();
        tokio::time::timeout(OP_TIMEOUT, conn.set_ex::<_, _, ()>(key, value, self.ttl_secs))
            .await
            .map_err(|_| CacheError::Timeout)??;
        debug!(key, ttl = self.ttl_secs, "Cache set");
        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> Result<usize, CacheError> {
        let mut conn = self.get_conn();
        let mut cursor: u64 = 0;
        let mut deleted = 0usize;

        // SCAN instead of KEYS so a purge never blocks the server.
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let removed: usize = conn.del(&keys).await?;
                deleted += removed;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(pattern, deleted, "Cache entries purged");
        Ok(deleted)
    }
}
