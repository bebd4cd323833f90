//! Strata library crate (used by the ops binary and integration tests).
//!
//! # Public API Surface
//!
//! ## Access paths
//! - [`CacheCoordinator`] - explicit cache-aside over an [`OriginStore`]
//! - [`DeclarativeCacheManager`], [`NamedCache`] - named caches with caller-computed values
//!
//! Both are views over one shared [`CacheTiers`], so they see the same entries,
//! load locks and TTLs.
//!
//! ## Tiers
//! - [`LocalCache`], [`LocalCacheManager`] - process-local L1 (moka)
//! - [`DistributedCache`], [`RedisDistributedCache`], [`InMemoryDistributedCache`] - shared L2
//! - [`PolicyTable`], [`NamespacePolicy`] - the single namespace → TTL table
//! - [`KeyLocks`] - per-key (or global) load locks
//!
//! ## Configuration & upkeep
//! - [`Config`], [`ConfigError`] - `STRATA_*` environment configuration
//! - [`MaintenanceTask`] - periodic negative-marker sweeps
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod cache;
pub mod config;
pub mod constants;
pub mod maintenance;
pub mod payload;

pub use cache::{
    CacheCoordinator, CacheEntry, CacheError, CacheKey, CacheResult, CacheStats, CacheTiers,
    CacheValue, Cacheable, CachedValue, DeclarativeCacheManager, DistributedCache,
    DistributedCacheError, DistributedCacheManager, DistributedCacheResult,
    InMemoryDistributedCache, InvalidationReport, KeyLocks, LocalCache, LocalCacheManager,
    LocalCacheStats, LockError, LockMode, Lookup, LookupStatus, NamedCache, NamespacePolicy,
    OriginError, OriginStore, PolicyError, PolicyTable, RedisDistributedCache, RenderedKey,
};
#[cfg(any(test, feature = "mock"))]
pub use cache::{MockCacheTiers, MockOriginStore};

pub use config::{Config, ConfigError};
pub use maintenance::{MaintenanceTask, NamespaceSweep, SweepReport};
pub use payload::{PayloadError, decode_entry, encode_entry};
