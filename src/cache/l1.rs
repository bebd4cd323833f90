//! L1 process-local cache (in-memory, one moka cache per namespace).
//!
//! Capacity, write-TTL and access-TTL are enforced by moka. Write-TTL is also
//! checked on every read against the entry's load time so that an entry is
//! never served after `local_write_ttl`, even before moka's housekeeping runs.
//! Values are stored type-erased so one manager can back every namespace.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use moka::ops::compute::Op;
use moka::sync::Cache;
use tokio::time::Instant;
use tracing::warn;

use super::policy::{NamespacePolicy, PolicyTable};

type LocalValue = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
struct LocalEntry {
    value: LocalValue,
    loaded_at: Instant,
}

impl LocalEntry {
    fn is(&self, loaded_at: Instant, value: &LocalValue) -> bool {
        self.loaded_at == loaded_at && Arc::ptr_eq(&self.value, value)
    }
}

/// Result of an L1 lookup.
#[derive(Debug)]
pub struct LocalHit<V> {
    value: Arc<V>,
    loaded_at: Instant,
    refresh_due: bool,
}

impl<V> LocalHit<V> {
    #[inline]
    pub fn value(&self) -> &Arc<V> {
        &self.value
    }

    #[inline]
    pub fn into_value(self) -> Arc<V> {
        self.value
    }

    #[inline]
    pub fn age(&self) -> Duration {
        self.loaded_at.elapsed()
    }

    /// Older than the namespace's refresh interval.
    #[inline]
    pub fn refresh_due(&self) -> bool {
        self.refresh_due
    }

    #[inline]
    pub(crate) fn loaded_at(&self) -> Instant {
        self.loaded_at
    }
}

/// Point-in-time L1 counters for one namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocalCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

impl LocalCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

/// Bounded in-memory cache for a single namespace.
pub struct LocalCache {
    namespace: String,
    entries: Cache<String, LocalEntry>,
    write_ttl: Duration,
    refresh_interval: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LocalCache {
    /// Creates a cache sized and timed by `policy`.
    pub fn from_policy(namespace: &str, policy: &NamespacePolicy) -> Self {
        let entries = Cache::builder()
            .max_capacity(policy.max_local_entries)
            .initial_capacity(policy.initial_local_capacity)
            .time_to_live(policy.local_write_ttl)
            .time_to_idle(policy.local_access_ttl)
            .build();

        Self {
            namespace: namespace.to_string(),
            entries,
            write_ttl: policy.local_write_ttl,
            refresh_interval: policy.local_refresh_interval,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the entry if present, unexpired, and of type `V`.
    pub fn get_if_present<V: Any + Send + Sync>(&self, key: &str) -> Option<LocalHit<V>> {
        let Some(entry) = self.entries.get(key) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let age = entry.loaded_at.elapsed();
        if age >= self.write_ttl {
            self.remove_if_current(key, &entry);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        match Arc::clone(&entry.value).downcast::<V>() {
            Ok(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(LocalHit {
                    value,
                    loaded_at: entry.loaded_at,
                    refresh_due: self.refresh_interval.is_some_and(|every| age >= every),
                })
            }
            Err(_) => {
                warn!(
                    namespace = %self.namespace,
                    key = key,
                    expected = std::any::type_name::<V>(),
                    "L1 entry has unexpected type, dropping"
                );
                self.remove_if_current(key, &entry);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Inserts or replaces `key`, resetting its load time.
    pub fn put<V: Any + Send + Sync>(&self, key: &str, value: Arc<V>) {
        self.entries.insert(
            key.to_string(),
            LocalEntry {
                value,
                loaded_at: Instant::now(),
            },
        );
    }

    /// Replaces `key` only if it still holds the entry loaded at `loaded_at`.
    /// Returns `false` when the entry was invalidated or replaced meanwhile.
    pub(crate) fn replace_if_loaded_at<V: Any + Send + Sync>(
        &self,
        key: &str,
        loaded_at: Instant,
        value: Arc<V>,
    ) -> bool {
        let result = self
            .entries
            .entry(key.to_string())
            .and_compute_with(|current| match current {
                Some(entry) if entry.value().loaded_at == loaded_at => Op::Put(LocalEntry {
                    value,
                    loaded_at: Instant::now(),
                }),
                _ => Op::Nop,
            });
        matches!(result, moka::ops::compute::CompResult::ReplacedWith(_))
    }

    /// Removes `key` only if it still holds the entry loaded at `loaded_at`.
    pub(crate) fn remove_if_loaded_at(&self, key: &str, loaded_at: Instant) {
        self.entries
            .entry(key.to_string())
            .and_compute_with(|current| match current {
                Some(entry) if entry.value().loaded_at == loaded_at => Op::Remove,
                _ => Op::Nop,
            });
    }

    fn remove_if_current(&self, key: &str, stale: &LocalEntry) {
        self.entries
            .entry(key.to_string())
            .and_compute_with(|current| match current {
                Some(entry) if entry.value().is(stale.loaded_at, &stale.value) => Op::Remove,
                _ => Op::Nop,
            });
    }

    #[inline]
    pub fn invalidate(&self, key: &str) {
        self.entries.invalidate(key);
    }

    #[inline]
    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }

    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Approximate entry count (exact after [`Self::run_pending_tasks`]).
    #[inline]
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.entry_count() == 0
    }

    #[inline]
    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }

    pub fn stats(&self) -> LocalCacheStats {
        LocalCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.entry_count(),
        }
    }
}

impl std::fmt::Debug for LocalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCache")
            .field("namespace", &self.namespace)
            .field("entries", &self.entries.entry_count())
            .field("write_ttl", &self.write_ttl)
            .finish()
    }
}

/// Local cache manager: one [`LocalCache`] per namespace, created on first use
/// from the shared [`PolicyTable`].
pub struct LocalCacheManager {
    policy: Arc<PolicyTable>,
    caches: DashMap<String, Arc<LocalCache>>,
}

impl LocalCacheManager {
    pub fn new(policy: Arc<PolicyTable>) -> Self {
        Self {
            policy,
            caches: DashMap::new(),
        }
    }

    /// Returns the cache for `namespace`, creating it if needed.
    pub fn cache(&self, namespace: &str) -> Arc<LocalCache> {
        if let Some(cache) = self.caches.get(namespace) {
            return Arc::clone(cache.value());
        }
        let policy = self.policy.policy(namespace);
        Arc::clone(
            self.caches
                .entry(namespace.to_string())
                .or_insert_with(|| Arc::new(LocalCache::from_policy(namespace, policy)))
                .value(),
        )
    }

    /// Namespaces that have a live local cache, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.iter().map(|c| c.key().clone()).collect();
        names.sort();
        names
    }

    pub fn invalidate_all(&self) {
        for cache in self.caches.iter() {
            cache.invalidate_all();
        }
    }

    pub fn stats(&self, namespace: &str) -> Option<LocalCacheStats> {
        self.caches.get(namespace).map(|c| c.stats())
    }
}

impl std::fmt::Debug for LocalCacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCacheManager")
            .field("namespaces", &self.names())
            .finish()
    }
}
