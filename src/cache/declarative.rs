//! Named-cache access path for callers that compute values themselves.
//!
//! A [`NamedCache`] composes the local manager in front of the distributed one:
//! reads consult L1 first, writes go to L2 then L1. It shares the tier stack
//! (and therefore entries, locks and TTLs) with every [`super::CacheCoordinator`].

use std::future::Future;

use tracing::instrument;

use super::error::{CacheError, CacheResult};
use super::l2::DistributedCache;
use super::origin::OriginError;
use super::stats::CacheStats;
use super::tiers::CacheTiers;
use super::types::{CacheKey, CacheValue, CachedValue, Lookup, LookupStatus, validate_namespace};

pub struct DeclarativeCacheManager<D: DistributedCache> {
    tiers: CacheTiers<D>,
}

impl<D: DistributedCache> Clone for DeclarativeCacheManager<D> {
    fn clone(&self) -> Self {
        Self {
            tiers: self.tiers.clone(),
        }
    }
}

impl<D: DistributedCache> DeclarativeCacheManager<D> {
    pub fn new(tiers: CacheTiers<D>) -> Self {
        Self { tiers }
    }

    #[inline]
    pub fn tiers(&self) -> &CacheTiers<D> {
        &self.tiers
    }

    /// Handle to the named cache; its policy comes from the shared table
    /// (falling back to the default policy for unconfigured names).
    pub fn cache(&self, name: &str) -> CacheResult<NamedCache<D>> {
        validate_namespace(name).map_err(|reason| CacheError::InvalidKey { reason })?;
        Ok(NamedCache {
            name: name.to_string(),
            tiers: self.tiers.clone(),
        })
    }

    /// Configured names plus any name used so far, sorted.
    pub fn cache_names(&self) -> Vec<String> {
        let mut names = self.tiers.policy().namespaces();
        names.extend(self.tiers.local().names());
        names.sort();
        names.dedup();
        names
    }
}

impl<D: DistributedCache> std::fmt::Debug for DeclarativeCacheManager<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeclarativeCacheManager")
            .field("caches", &self.cache_names())
            .finish()
    }
}

pub struct NamedCache<D: DistributedCache> {
    name: String,
    tiers: CacheTiers<D>,
}

impl<D: DistributedCache> Clone for NamedCache<D> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            tiers: self.tiers.clone(),
        }
    }
}

impl<D: DistributedCache> NamedCache<D> {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn key(&self, id: &str) -> CacheResult<CacheKey> {
        CacheKey::new(self.name.as_str(), id)
    }

    /// Tier-only read. `Some(Absent)` means a negative marker is live; `None` is
    /// a miss (or an invalid id, or an unreachable L2).
    pub async fn get<T: CacheValue>(&self, id: &str) -> Option<CachedValue<T>> {
        let key = self.key(id).ok()?;
        self.tiers.peek(&key).await
    }

    /// Read-through with a caller-supplied loader, under the same load lock and
    /// negative caching as the coordinator.
    ///
    /// The loader is owned (`'static`): once the lock is taken it runs to
    /// completion even if this call is dropped.
    #[instrument(skip(self, loader), fields(cache = %self.name))]
    pub async fn get_or_compute<T, F, Fut>(&self, id: &str, loader: F) -> Lookup<T>
    where
        T: CacheValue,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<T>, OriginError>> + Send + 'static,
    {
        match self.key(id) {
            Ok(key) => self.tiers.read_through(&key, loader).await,
            Err(_) => Lookup::empty(LookupStatus::InvalidKey),
        }
    }

    pub async fn put<T: CacheValue>(&self, id: &str, value: &T) -> CacheResult<()> {
        let key = self.key(id)?;
        self.tiers.write_through(&key, value.clone()).await
    }

    pub async fn evict(&self, id: &str) -> CacheResult<()> {
        let key = self.key(id)?;
        self.tiers.evict(&key).await
    }

    /// Removes every entry of this cache from both tiers.
    pub async fn clear(&self) -> CacheResult<usize> {
        self.tiers.clear_namespace(&self.name).await
    }

    pub fn stats(&self) -> CacheStats {
        self.tiers.stats(&self.name)
    }
}

impl<D: DistributedCache> std::fmt::Debug for NamedCache<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedCache")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
