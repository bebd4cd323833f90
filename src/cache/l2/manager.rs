use std::sync::Arc;

use tracing::{debug, warn};

use super::backend::DistributedCache;
use super::error::{DistributedCacheError, DistributedCacheResult};
use crate::cache::policy::PolicyTable;
use crate::cache::types::{CacheEntry, CacheValue, CachedValue, RenderedKey};
use crate::payload::{decode_entry, encode_entry};

/// What the distributed tier holds for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stored<V> {
    Present(V),
    /// A negative marker is live for this key.
    Negative,
    Miss,
}

/// Typed, namespace-aware view over a [`DistributedCache`].
///
/// TTLs come from the shared [`PolicyTable`]; callers never pass one.
pub struct DistributedCacheManager<D: DistributedCache> {
    backend: D,
    policy: Arc<PolicyTable>,
}

impl<D: DistributedCache> DistributedCacheManager<D> {
    pub fn new(backend: D, policy: Arc<PolicyTable>) -> Self {
        Self { backend, policy }
    }

    #[inline]
    pub fn backend(&self) -> &D {
        &self.backend
    }

    /// Looks up the positive key, then the negative-marker key.
    pub async fn fetch<V: CacheValue>(&self, key: &RenderedKey) -> DistributedCacheResult<Stored<V>> {
        if let Some(bytes) = self.backend.get(&key.positive).await? {
            match decode_entry::<V>(&bytes) {
                Ok(entry) => {
                    return Ok(match entry.value {
                        CachedValue::Present(value) => Stored::Present(value),
                        CachedValue::Absent => Stored::Negative,
                    });
                }
                Err(e) => {
                    warn!(key = %key.positive, error = %e, "Undecodable L2 entry, treating as miss");
                }
            }
        }

        if self.backend.get(&key.negative).await?.is_some() {
            debug!(key = %key.negative, "L2 negative marker hit");
            return Ok(Stored::Negative);
        }

        Ok(Stored::Miss)
    }

    /// Writes `value` under the positive key with the namespace's distributed TTL.
    pub async fn store_present<V: CacheValue>(
        &self,
        namespace: &str,
        key: &RenderedKey,
        value: &V,
    ) -> DistributedCacheResult<()> {
        let ttl = self.policy.policy(namespace).distributed_ttl;
        let bytes = encode_entry(&CacheEntry::present(value, ttl)).map_err(|e| {
            DistributedCacheError::Serialization {
                reason: e.to_string(),
            }
        })?;
        self.backend.set(&key.positive, bytes, ttl).await
    }

    /// Writes a negative marker with the namespace's negative TTL.
    pub async fn store_negative(&self, namespace: &str, key: &RenderedKey) -> DistributedCacheResult<()> {
        let ttl = self.policy.policy(namespace).negative_ttl;
        let bytes = encode_entry(&CacheEntry::<()>::absent(ttl)).map_err(|e| {
            DistributedCacheError::Serialization {
                reason: e.to_string(),
            }
        })?;
        self.backend.set(&key.negative, bytes, ttl).await
    }

    pub async fn delete(&self, key: &str) -> DistributedCacheResult<bool> {
        self.backend.delete(key).await
    }

    /// Deletes every key matching `pattern`; returns how many existed.
    ///
    /// Stops at the first failed delete so the caller learns the sweep is incomplete.
    pub async fn sweep(&self, pattern: &str) -> DistributedCacheResult<usize> {
        let keys = self.backend.keys(pattern).await?;
        let mut deleted = 0;
        for key in &keys {
            if self.backend.delete(key).await? {
                deleted += 1;
            }
        }
        debug!(pattern = pattern, matched = keys.len(), deleted, "L2 sweep complete");
        Ok(deleted)
    }

    pub async fn keys(&self, pattern: &str) -> DistributedCacheResult<Vec<String>> {
        self.backend.keys(pattern).await
    }

    pub async fn is_ready(&self) -> bool {
        self.backend.is_ready().await
    }
}

impl<D: DistributedCache> std::fmt::Debug for DistributedCacheManager<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedCacheManager")
            .field("key_prefix", &self.policy.key_prefix())
            .finish_non_exhaustive()
    }
}
