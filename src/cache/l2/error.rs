use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by the distributed (L2) tier.
pub enum DistributedCacheError {
    /// The backing store could not be reached (connection refused/dropped, IO, timeout).
    #[error("distributed cache unavailable: {reason}")]
    Unavailable {
        /// Error message.
        reason: String,
    },

    /// The store answered, but rejected the command.
    #[error("distributed cache command failed: {reason}")]
    Command {
        /// Error message.
        reason: String,
    },

    /// A payload could not be encoded.
    #[error("payload serialization failed: {reason}")]
    Serialization {
        /// Error message.
        reason: String,
    },
}

impl DistributedCacheError {
    #[inline]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DistributedCacheError::Unavailable { .. })
    }
}

impl From<redis::RedisError> for DistributedCacheError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
        {
            DistributedCacheError::Unavailable {
                reason: e.to_string(),
            }
        } else {
            DistributedCacheError::Command {
                reason: e.to_string(),
            }
        }
    }
}

/// Convenience result type for L2 operations.
pub type DistributedCacheResult<T> = Result<T, DistributedCacheError>;
