use thiserror::Error;

use super::l2::DistributedCacheError;
use super::policy::PolicyError;

#[derive(Debug, Error)]
/// Errors returned by cache write paths and configuration.
///
/// Read paths do not fail: tier outages degrade to origin loads and are reported
/// through [`super::LookupStatus`] instead.
pub enum CacheError {
    /// Empty or malformed namespace/identifier. Rejected before any tier is touched.
    #[error("invalid cache key: {reason}")]
    InvalidKey {
        /// Error message.
        reason: String,
    },

    /// The distributed tier failed on a write.
    #[error("distributed cache error: {0}")]
    Distributed(#[from] DistributedCacheError),

    /// An invalidation could not reach the distributed tier; the entry may be stale
    /// until its TTL elapses unless the caller retries.
    #[error("invalidation of '{key}' failed: {source}")]
    InvalidationFailed {
        /// Rendered key that could not be deleted.
        key: String,
        #[source]
        source: DistributedCacheError,
    },

    /// A value could not be encoded for the distributed tier.
    #[error("failed to serialize value for '{key}': {reason}")]
    Serialization {
        /// Rendered key.
        key: String,
        /// Error message.
        reason: String,
    },

    /// Invalid namespace policy.
    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),
}

impl CacheError {
    /// Returns `true` if the error leaves a distributed entry possibly stale.
    pub fn is_stale_risk(&self) -> bool {
        matches!(self, CacheError::InvalidationFailed { .. })
    }
}

/// Convenience result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
