//! Redis-backed distributed tier.

use std::time::Duration;

use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tracing::debug;

use super::error::{DistributedCacheError, DistributedCacheResult};

const SCAN_BATCH: usize = 500;

/// Redis client sharing one multiplexed connection across callers.
#[derive(Clone)]
pub struct RedisDistributedCache {
    url: String,
    conn: MultiplexedConnection,
}

impl RedisDistributedCache {
    /// Opens a client and establishes the multiplexed connection.
    pub async fn connect(url: &str) -> DistributedCacheResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        debug!("Connected to Redis");
        Ok(Self {
            url: url.to_string(),
            conn,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn ping(&self) -> DistributedCacheResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    pub(crate) async fn get_bytes(&self, key: &str) -> DistributedCacheResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    pub(crate) async fn set_bytes(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> DistributedCacheResult<()> {
        let mut conn = self.conn.clone();
        // SETEX rejects 0; round sub-second TTLs up.
        let secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, secs).await?;
        Ok(())
    }

    pub(crate) async fn delete_key(&self, key: &str) -> DistributedCacheResult<bool> {
        let mut conn = self.conn.clone();
        let deleted: i64 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    /// Cursor-based SCAN so large keyspaces never block the server.
    pub(crate) async fn scan_keys(&self, pattern: &str) -> DistributedCacheResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut out = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            out.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once.
        out.sort();
        out.dedup();
        Ok(out)
    }
}

impl std::fmt::Debug for RedisDistributedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisDistributedCache")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

