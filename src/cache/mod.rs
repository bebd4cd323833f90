//! Two-tier cache-aside: process-local L1 in front of a shared distributed L2.

pub mod coordinator;
pub mod declarative;
pub mod error;
pub mod l1;
pub mod l2;
pub mod lock;
pub mod origin;
pub mod policy;
pub mod stats;
pub mod tiers;
pub mod types;


pub use coordinator::{CacheCoordinator, InvalidationReport};
pub use declarative::{DeclarativeCacheManager, NamedCache};
pub use error::{CacheError, CacheResult};
pub use l1::{LocalCache, LocalCacheManager, LocalCacheStats, LocalHit};
pub use l2::{
    DistributedCache, DistributedCacheError, DistributedCacheManager, DistributedCacheResult,
    InMemoryDistributedCache, OpCounts, RedisDistributedCache, Stored,
};
pub use lock::{KeyLockGuard, KeyLocks, LockError, LockMode};
#[cfg(any(test, feature = "mock"))]
pub use origin::MockOriginStore;
pub use origin::{OriginError, OriginStore};
pub use policy::{NamespacePolicy, PolicyError, PolicyTable};
pub use stats::{CacheStats, NamespaceStats};
#[cfg(any(test, feature = "mock"))]
pub use tiers::MockCacheTiers;
pub use tiers::CacheTiers;
pub use types::{
    CacheEntry, CacheKey, CacheValue, Cacheable, CachedValue, Lookup, LookupStatus, RenderedKey,
};
