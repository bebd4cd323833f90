use std::sync::Arc;
use std::time::Duration;

use super::error::DistributedCacheError;
use super::memory::InMemoryDistributedCache;
use super::redis_store::RedisDistributedCache;

/// Shared, network-reachable key/value store with per-key TTL.
///
/// Values are opaque bytes; TTL accuracy is bounded by the store's own clock.
pub trait DistributedCache: Send + Sync + 'static {
    /// Returns `true` if the store answers requests.
    fn is_ready(&self) -> impl std::future::Future<Output = bool> + Send;

    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>, DistributedCacheError>> + Send;

    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), DistributedCacheError>> + Send;

    /// Deletes `key`; returns `true` if it existed.
    fn delete(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<bool, DistributedCacheError>> + Send;

    /// Lists keys matching a glob `pattern` (`*`, `?`), for bulk invalidation sweeps.
    fn keys(
        &self,
        pattern: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>, DistributedCacheError>> + Send;
}

impl DistributedCache for RedisDistributedCache {
    async fn is_ready(&self) -> bool {
        self.ping().await.is_ok()
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DistributedCacheError> {
        self.get_bytes(key).await
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), DistributedCacheError> {
        self.set_bytes(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, DistributedCacheError> {
        self.delete_key(key).await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, DistributedCacheError> {
        self.scan_keys(pattern).await
    }
}

impl DistributedCache for InMemoryDistributedCache {
    async fn is_ready(&self) -> bool {
        self.check_available().is_ok()
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DistributedCacheError> {
        self.get_bytes(key)
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), DistributedCacheError> {
        self.set_bytes(key, value, ttl)
    }

    async fn delete(&self, key: &str) -> Result<bool, DistributedCacheError> {
        self.delete_key(key)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, DistributedCacheError> {
        self.matching_keys(pattern)
    }
}

/// Lets several tier stacks (e.g. simulated processes) share one store.
impl<T: DistributedCache> DistributedCache for Arc<T> {
    async fn is_ready(&self) -> bool {
        self.as_ref().is_ready().await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DistributedCacheError> {
        self.as_ref().get(key).await
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), DistributedCacheError> {
        self.as_ref().set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, DistributedCacheError> {
        self.as_ref().delete(key).await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, DistributedCacheError> {
        self.as_ref().keys(pattern).await
    }
}
