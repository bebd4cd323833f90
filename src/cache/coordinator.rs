//! Explicit cache-aside front-end for one namespace backed by an [`OriginStore`].

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, info, instrument};

use super::error::{CacheError, CacheResult};
use super::l2::DistributedCache;
use super::origin::OriginStore;
use super::stats::CacheStats;
use super::tiers::CacheTiers;
use super::types::{CacheKey, Cacheable, Lookup, LookupStatus, validate_namespace};

/// Outcome of a batch invalidation. Every id is attempted.
#[derive(Debug, Default)]
pub struct InvalidationReport {
    pub invalidated: usize,
    pub failed: Vec<(String, CacheError)>,
}

impl InvalidationReport {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Reads, writes and invalidates entities of one namespace through L1 and L2.
///
/// Concurrent misses for the same id collapse onto a single origin load. A
/// confirmed absence is remembered as a negative marker in L2 for the
/// namespace's negative TTL.
pub struct CacheCoordinator<O: OriginStore, D: DistributedCache> {
    namespace: String,
    origin: Arc<O>,
    tiers: CacheTiers<D>,
}

impl<O: OriginStore, D: DistributedCache> std::fmt::Debug for CacheCoordinator<O, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCoordinator")
            .field("namespace", &self.namespace)
            .field("tiers", &self.tiers)
            .finish_non_exhaustive()
    }
}

impl<O: OriginStore, D: DistributedCache> CacheCoordinator<O, D> {
    pub fn new(tiers: CacheTiers<D>, namespace: impl Into<String>, origin: O) -> CacheResult<Self> {
        let namespace = namespace.into();
        validate_namespace(&namespace).map_err(|reason| CacheError::InvalidKey { reason })?;
        Ok(Self {
            namespace,
            origin: Arc::new(origin),
            tiers,
        })
    }

    #[inline]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[inline]
    pub fn origin(&self) -> &O {
        &self.origin
    }

    #[inline]
    pub fn tiers(&self) -> &CacheTiers<D> {
        &self.tiers
    }

    fn key(&self, id: &str) -> CacheResult<CacheKey> {
        CacheKey::new(self.namespace.as_str(), id)
    }

    /// Returns the entity, or `None` when it does not exist, the id is invalid,
    /// or the origin failed. See [`Self::lookup`] to tell those apart.
    pub async fn get(&self, id: &str) -> Option<O::Entity> {
        self.lookup(id).await.into_value()
    }

    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn lookup(&self, id: &str) -> Lookup<O::Entity> {
        let key = match self.key(id) {
            Ok(key) => key,
            Err(e) => {
                debug!(error = %e, "Rejected lookup");
                return Lookup::empty(LookupStatus::InvalidKey);
            }
        };
        let origin = Arc::clone(&self.origin);
        let id = key.id().to_string();
        self.tiers
            .read_through(&key, move || async move { origin.load(&id).await })
            .await
    }

    /// Stores `value` under its own id: L2 first, then L1.
    #[instrument(skip(self, value), fields(namespace = %self.namespace))]
    pub async fn put(&self, value: &O::Entity) -> CacheResult<()> {
        let key = self.key(&value.cache_id())?;
        self.tiers.write_through(&key, value.clone()).await
    }

    /// Removes the entity from both tiers along with any negative marker.
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn invalidate(&self, id: &str) -> CacheResult<()> {
        let key = self.key(id)?;
        self.tiers.evict(&key).await
    }

    /// Concurrent [`Self::get`] for each id, results in input order.
    pub async fn get_many<S: AsRef<str>>(&self, ids: &[S]) -> Vec<Option<O::Entity>> {
        join_all(ids.iter().map(|id| self.get(id.as_ref()))).await
    }

    /// Stores every value; all are attempted and the first error is returned.
    pub async fn put_many(&self, values: &[O::Entity]) -> CacheResult<()> {
        let results = join_all(values.iter().map(|value| self.put(value))).await;
        results.into_iter().collect()
    }

    pub async fn invalidate_many<S: AsRef<str>>(&self, ids: &[S]) -> InvalidationReport {
        let results = join_all(ids.iter().map(|id| self.invalidate(id.as_ref()))).await;

        let mut report = InvalidationReport::default();
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(()) => report.invalidated += 1,
                Err(e) => report.failed.push((id.as_ref().to_string(), e)),
            }
        }
        report
    }

    /// Drops every entry of this namespace from both tiers; returns how many L2
    /// keys were deleted.
    pub async fn invalidate_namespace(&self) -> CacheResult<usize> {
        self.tiers.clear_namespace(&self.namespace).await
    }

    pub async fn purge_negative_markers(&self) -> CacheResult<usize> {
        self.tiers.purge_negative(&self.namespace).await
    }

    /// Reads each id through the tiers so later reads hit; returns how many exist.
    #[instrument(skip(self, ids), fields(namespace = %self.namespace, count = ids.len()))]
    pub async fn warm_up<S: AsRef<str>>(&self, ids: &[S]) -> usize {
        let found = self.get_many(ids).await.iter().flatten().count();
        info!(found, "Warm-up complete");
        found
    }

    pub fn stats(&self) -> CacheStats {
        self.tiers.stats(&self.namespace)
    }
}
