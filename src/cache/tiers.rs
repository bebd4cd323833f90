//! The per-process tier stack shared by every access path.
//!
//! A [`CacheTiers`] bundles the policy table, both cache managers, the load-lock
//! table and the per-namespace counters. Coordinators and the declarative manager
//! are thin views over one shared stack, so they observe the same entries, locks
//! and TTLs.

use std::future::Future;
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tokio::time::Instant;
use tracing::{Instrument, debug, info, warn};

use super::error::{CacheError, CacheResult};
use super::l1::{LocalCache, LocalCacheManager};
use super::l2::{DistributedCache, DistributedCacheError, DistributedCacheManager, Stored};
use super::lock::{KeyLockGuard, KeyLocks, LockMode};
use super::origin::OriginError;
use super::policy::PolicyTable;
use super::stats::{CacheStats, Counter, NamespaceStats};
use super::types::{CacheKey, CacheValue, CachedValue, Lookup, LookupStatus, RenderedKey};
use crate::constants::DEFAULT_LOCK_TIMEOUT;

pub(crate) struct TiersInner<D: DistributedCache> {
    pub(crate) policy: Arc<PolicyTable>,
    pub(crate) local: LocalCacheManager,
    pub(crate) distributed: DistributedCacheManager<D>,
    pub(crate) locks: KeyLocks,
    pub(crate) stats: DashMap<String, Arc<NamespaceStats>>,
    /// Rendered keys with a refresh-ahead task in flight.
    pub(crate) refreshing: DashSet<String>,
}

/// Shared handle to the tier stack. Cloning is cheap.
pub struct CacheTiers<D: DistributedCache> {
    pub(crate) inner: Arc<TiersInner<D>>,
}

impl<D: DistributedCache> Clone for CacheTiers<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: DistributedCache> CacheTiers<D> {
    /// Validates `policy` and assembles the stack.
    pub fn new(policy: PolicyTable, backend: D, locks: KeyLocks) -> CacheResult<Self> {
        policy.validate()?;
        let policy = Arc::new(policy);
        Ok(Self {
            inner: Arc::new(TiersInner {
                local: LocalCacheManager::new(Arc::clone(&policy)),
                distributed: DistributedCacheManager::new(backend, Arc::clone(&policy)),
                policy,
                locks,
                stats: DashMap::new(),
                refreshing: DashSet::new(),
            }),
        })
    }

    /// Default policy table, per-key locks, default lock timeout.
    pub fn with_defaults(backend: D) -> CacheResult<Self> {
        Self::new(
            PolicyTable::default(),
            backend,
            KeyLocks::new(LockMode::PerKey, Some(DEFAULT_LOCK_TIMEOUT)),
        )
    }

    #[inline]
    pub fn policy(&self) -> &PolicyTable {
        &self.inner.policy
    }

    #[inline]
    pub fn local(&self) -> &LocalCacheManager {
        &self.inner.local
    }

    #[inline]
    pub fn distributed(&self) -> &DistributedCacheManager<D> {
        &self.inner.distributed
    }

    #[inline]
    pub fn backend(&self) -> &D {
        self.inner.distributed.backend()
    }

    #[inline]
    pub fn locks(&self) -> &KeyLocks {
        &self.inner.locks
    }

    pub(crate) fn counters(&self, namespace: &str) -> Arc<NamespaceStats> {
        if let Some(stats) = self.inner.stats.get(namespace) {
            return Arc::clone(stats.value());
        }
        Arc::clone(
            self.inner
                .stats
                .entry(namespace.to_string())
                .or_default()
                .value(),
        )
    }

    /// Counter snapshot for `namespace`.
    pub fn stats(&self, namespace: &str) -> CacheStats {
        let local = self.local().stats(namespace).unwrap_or_default();
        self.counters(namespace).snapshot(namespace, local)
    }

    pub async fn is_ready(&self) -> bool {
        self.distributed().is_ready().await
    }

    /// Number of refresh-ahead tasks currently running.
    pub fn refreshes_in_flight(&self) -> usize {
        self.inner.refreshing.len()
    }
}

// Read-through and write protocol shared by the coordinator and the declarative
// manager. L1 never holds negatives; a negative marker lives only in L2.
impl<D: DistributedCache> CacheTiers<D> {
    /// L1, then L2, then origin under the load lock with a second tier check.
    ///
    /// Once the lock is held, the double-check, origin load and write-back run in
    /// a spawned task that owns the lock guard. A caller that stops waiting (for
    /// example under its own timeout) does not cancel the load; later readers
    /// find the written entry.
    pub(crate) async fn read_through<V, F, Fut>(&self, key: &CacheKey, load: F) -> Lookup<V>
    where
        V: CacheValue,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<V>, OriginError>> + Send + 'static,
    {
        let namespace = key.namespace();
        let rendered = self.policy().render(key);
        let local = self.local().cache(namespace);
        let stats = self.counters(namespace);

        if let Some(value) = self.local_hit::<V>(&local, namespace, &rendered, &stats) {
            debug!(key = %rendered.positive, "L1 cache hit");
            return Lookup::new(LookupStatus::HitL1, Some(value));
        }

        debug!(key = %rendered.positive, "L1 miss, checking L2 cache");
        match self.read_tiers::<V>(&local, &rendered, &stats).await {
            Ok(Some(lookup)) => return lookup,
            Ok(None) => {}
            Err(e) => {
                warn!(key = %rendered.positive, error = %e, "L2 read failed, loading from origin uncached");
                stats.incr(Counter::DegradedRead);
                return Self::load_uncached(&rendered, load, &stats).await;
            }
        }

        let guard = match self.locks().acquire(&rendered.positive).await {
            Ok(guard) => guard,
            Err(e) => {
                warn!(error = %e, "Load lock wait timed out, loading from origin uncached");
                stats.incr(Counter::LockTimeout);
                return Self::load_uncached(&rendered, load, &stats).await;
            }
        };

        let tiers = self.clone();
        let owned_namespace = namespace.to_string();
        let owned_rendered = rendered.clone();
        let task = tokio::spawn(
            async move {
                tiers
                    .load_locked(&owned_namespace, &owned_rendered, load, guard)
                    .await
            }
            .in_current_span(),
        );
        match task.await {
            Ok(lookup) => lookup,
            Err(e) => {
                stats.incr(Counter::OriginError);
                warn!(key = %rendered.positive, error = %e, "Origin load task failed");
                Lookup::empty(LookupStatus::OriginUnavailable)
            }
        }
    }

    /// Locked section of [`Self::read_through`]. Runs to completion even if the
    /// caller that started it went away; the lock is released on return.
    async fn load_locked<V, F, Fut>(
        &self,
        namespace: &str,
        rendered: &RenderedKey,
        load: F,
        _guard: KeyLockGuard,
    ) -> Lookup<V>
    where
        V: CacheValue,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, OriginError>>,
    {
        let local = self.local().cache(namespace);
        let stats = self.counters(namespace);

        // Another caller may have populated the tiers while we waited.
        if let Some(value) = self.local_hit::<V>(&local, namespace, rendered, &stats) {
            debug!(key = %rendered.positive, "L1 cache hit after lock");
            return Lookup::new(LookupStatus::HitL1, Some(value));
        }
        match self.read_tiers::<V>(&local, rendered, &stats).await {
            Ok(Some(lookup)) => return lookup,
            Ok(None) => {}
            Err(e) => {
                warn!(key = %rendered.positive, error = %e, "L2 read failed under lock, loading from origin uncached");
                stats.incr(Counter::DegradedRead);
                return Self::load_uncached(rendered, load, &stats).await;
            }
        }

        stats.incr(Counter::OriginLoad);
        match load().await {
            Ok(Some(value)) => {
                match self.distributed().store_present(namespace, rendered, &value).await {
                    Ok(()) => local.put(&rendered.positive, Arc::new(value.clone())),
                    Err(e) => {
                        warn!(key = %rendered.positive, error = %e, "L2 write failed, leaving tiers unpopulated");
                    }
                }
                info!(key = %rendered.positive, "Loaded from origin");
                Lookup::new(LookupStatus::Loaded, Some(value))
            }
            Ok(None) => {
                stats.incr(Counter::OriginMiss);
                if let Err(e) = self.distributed().store_negative(namespace, rendered).await {
                    warn!(key = %rendered.negative, error = %e, "Failed to write negative marker");
                }
                info!(key = %rendered.positive, "Origin confirmed absence");
                Lookup::empty(LookupStatus::NotFound)
            }
            Err(e) => {
                stats.incr(Counter::OriginError);
                warn!(key = %rendered.positive, error = %e, "Origin load failed");
                Lookup::empty(LookupStatus::OriginUnavailable)
            }
        }
    }

    /// Tier-only read: L1, then L2 (backfilling L1). Never calls the origin.
    pub(crate) async fn peek<V: CacheValue>(&self, key: &CacheKey) -> Option<CachedValue<V>> {
        let namespace = key.namespace();
        let rendered = self.policy().render(key);
        let local = self.local().cache(namespace);
        let stats = self.counters(namespace);

        if let Some(value) = self.local_hit::<V>(&local, namespace, &rendered, &stats) {
            return Some(CachedValue::Present(value));
        }
        match self.read_tiers::<V>(&local, &rendered, &stats).await {
            Ok(Some(lookup)) => Some(match lookup.into_value() {
                Some(value) => CachedValue::Present(value),
                None => CachedValue::Absent,
            }),
            Ok(None) => None,
            Err(e) => {
                warn!(key = %rendered.positive, error = %e, "L2 read failed, reporting miss");
                stats.incr(Counter::DegradedRead);
                None
            }
        }
    }

    /// Writes L2 first, then L1. An L2 failure leaves L1 untouched.
    pub(crate) async fn write_through<V: CacheValue>(&self, key: &CacheKey, value: V) -> CacheResult<()> {
        let namespace = key.namespace();
        let rendered = self.policy().render(key);

        self.distributed()
            .store_present(namespace, &rendered, &value)
            .await
            .map_err(|e| match e {
                DistributedCacheError::Serialization { reason } => CacheError::Serialization {
                    key: rendered.positive.clone(),
                    reason,
                },
                other => CacheError::Distributed(other),
            })?;

        self.local().cache(namespace).put(&rendered.positive, Arc::new(value));
        debug!(key = %rendered.positive, "Stored in L2 and L1");
        Ok(())
    }

    /// Removes the positive entry from both tiers and any negative marker.
    ///
    /// Every step is attempted; the first distributed failure is returned.
    pub(crate) async fn evict(&self, key: &CacheKey) -> CacheResult<()> {
        let rendered = self.policy().render(key);

        let positive = self.distributed().delete(&rendered.positive).await;
        self.local().cache(key.namespace()).invalidate(&rendered.positive);
        let negative = self.distributed().delete(&rendered.negative).await;

        let failure = match (positive, negative) {
            (Err(source), _) => Some((rendered.positive.clone(), source)),
            (Ok(_), Err(source)) => Some((rendered.negative.clone(), source)),
            _ => None,
        };
        match failure {
            Some((key, source)) => {
                warn!(key = %key, error = %source, "Invalidation did not reach L2");
                Err(CacheError::InvalidationFailed { key, source })
            }
            None => {
                debug!(key = %rendered.positive, "Invalidated");
                Ok(())
            }
        }
    }

    /// Drops every entry of `namespace` from both tiers, negatives included.
    pub(crate) async fn clear_namespace(&self, namespace: &str) -> CacheResult<usize> {
        self.local().cache(namespace).invalidate_all();
        let pattern = self.policy().namespace_pattern(namespace);
        let removed = self
            .distributed()
            .sweep(&pattern)
            .await
            .map_err(|source| CacheError::InvalidationFailed {
                key: pattern.clone(),
                source,
            })?;
        info!(namespace = namespace, removed, "Cleared namespace");
        Ok(removed)
    }

    /// Deletes every negative marker of `namespace`.
    pub(crate) async fn purge_negative(&self, namespace: &str) -> CacheResult<usize> {
        let pattern = self.policy().negative_pattern(namespace);
        let removed = self
            .distributed()
            .sweep(&pattern)
            .await
            .map_err(|source| CacheError::InvalidationFailed {
                key: pattern.clone(),
                source,
            })?;
        debug!(namespace = namespace, removed, "Purged negative markers");
        Ok(removed)
    }

    fn local_hit<V: CacheValue>(
        &self,
        local: &LocalCache,
        namespace: &str,
        rendered: &RenderedKey,
        stats: &NamespaceStats,
    ) -> Option<V> {
        let hit = local.get_if_present::<V>(&rendered.positive)?;
        stats.incr(Counter::L1Hit);
        if hit.refresh_due() {
            self.schedule_refresh::<V>(namespace, rendered, hit.loaded_at());
        }
        Some(V::clone(hit.value()))
    }

    /// `Ok(None)` is a miss in both tiers.
    async fn read_tiers<V: CacheValue>(
        &self,
        local: &LocalCache,
        rendered: &RenderedKey,
        stats: &NamespaceStats,
    ) -> Result<Option<Lookup<V>>, DistributedCacheError> {
        match self.distributed().fetch::<V>(rendered).await? {
            Stored::Present(value) => {
                stats.incr(Counter::L2Hit);
                local.put(&rendered.positive, Arc::new(value.clone()));
                debug!(key = %rendered.positive, "L2 cache hit, backfilled L1");
                Ok(Some(Lookup::new(LookupStatus::HitL2, Some(value))))
            }
            Stored::Negative => {
                stats.incr(Counter::NegativeHit);
                debug!(key = %rendered.positive, "Negative marker hit");
                Ok(Some(Lookup::empty(LookupStatus::HitNegative)))
            }
            Stored::Miss => Ok(None),
        }
    }

    async fn load_uncached<V, F, Fut>(rendered: &RenderedKey, load: F, stats: &NamespaceStats) -> Lookup<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, OriginError>>,
    {
        stats.incr(Counter::OriginLoad);
        match load().await {
            Ok(Some(value)) => Lookup::new(LookupStatus::Bypassed, Some(value)),
            Ok(None) => {
                stats.incr(Counter::OriginMiss);
                Lookup::empty(LookupStatus::Bypassed)
            }
            Err(e) => {
                stats.incr(Counter::OriginError);
                warn!(key = %rendered.positive, error = %e, "Origin load failed");
                Lookup::empty(LookupStatus::OriginUnavailable)
            }
        }
    }

    /// Spawns at most one background L2 re-read per key. The origin is never consulted.
    fn schedule_refresh<V: CacheValue>(&self, namespace: &str, rendered: &RenderedKey, loaded_at: Instant) {
        if !self.inner.refreshing.insert(rendered.positive.clone()) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.inner.refreshing.remove(&rendered.positive);
            return;
        };

        let tiers = self.clone();
        let namespace = namespace.to_string();
        let rendered = rendered.clone();
        runtime.spawn(async move {
            tiers.refresh_local::<V>(&namespace, &rendered, loaded_at).await;
            tiers.inner.refreshing.remove(&rendered.positive);
        });
    }

    async fn refresh_local<V: CacheValue>(&self, namespace: &str, rendered: &RenderedKey, loaded_at: Instant) {
        let local = self.local().cache(namespace);
        match self.distributed().fetch::<V>(rendered).await {
            Ok(Stored::Present(value)) => {
                if local.replace_if_loaded_at(&rendered.positive, loaded_at, Arc::new(value)) {
                    self.counters(namespace).incr(Counter::Refresh);
                    debug!(key = %rendered.positive, "Refreshed L1 entry from L2");
                }
            }
            Ok(Stored::Negative | Stored::Miss) => {
                local.remove_if_loaded_at(&rendered.positive, loaded_at);
                debug!(key = %rendered.positive, "L2 entry gone, dropped L1 copy");
            }
            Err(e) => {
                debug!(key = %rendered.positive, error = %e, "Refresh skipped, keeping L1 copy");
            }
        }
    }
}

impl<D: DistributedCache> std::fmt::Debug for CacheTiers<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheTiers")
            .field("policy", &self.inner.policy)
            .field("local", &self.inner.local)
            .field("locks", &self.inner.locks)
            .finish_non_exhaustive()
    }
}

#[cfg(any(test, feature = "mock"))]
pub type MockCacheTiers = CacheTiers<Arc<super::l2::InMemoryDistributedCache>>;

#[cfg(any(test, feature = "mock"))]
impl CacheTiers<Arc<super::l2::InMemoryDistributedCache>> {
    /// Tier stack over a fresh in-memory store.
    pub fn new_mock(policy: PolicyTable) -> CacheResult<Self> {
        Self::new_mock_with_store(policy, Arc::new(super::l2::InMemoryDistributedCache::new()))
    }

    /// Tier stack over an existing store; two stacks sharing one store behave
    /// like two processes sharing one distributed cache.
    pub fn new_mock_with_store(
        policy: PolicyTable,
        store: Arc<super::l2::InMemoryDistributedCache>,
    ) -> CacheResult<Self> {
        Self::new(
            policy,
            store,
            KeyLocks::new(LockMode::PerKey, Some(DEFAULT_LOCK_TIMEOUT)),
        )
    }
}
