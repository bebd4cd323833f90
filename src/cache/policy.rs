//! Namespace → TTL policy table.
//!
//! One [`PolicyTable`] is built per process and handed (behind an `Arc`) to every
//! component that reads or writes a tier, so the imperative coordinator and the
//! declarative manager can never disagree on a TTL.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

use super::types::{CacheKey, RenderedKey, validate_namespace};
use crate::constants::{
    DEFAULT_DISTRIBUTED_TTL, DEFAULT_INITIAL_LOCAL_CAPACITY, DEFAULT_LOCAL_ACCESS_TTL,
    DEFAULT_LOCAL_REFRESH_INTERVAL, DEFAULT_LOCAL_WRITE_TTL, DEFAULT_MAX_LOCAL_ENTRIES,
    DEFAULT_NEGATIVE_TTL, GLOB_METACHARS, KEY_DELIMITER, MAX_TTL, NEGATIVE_SEGMENT,
    USER_DISTRIBUTED_TTL, USER_LIST_DISTRIBUTED_TTL, USER_LIST_NAMESPACE, USER_NAMESPACE,
};

#[derive(Debug, Error, PartialEq, Eq)]
/// Errors from policy validation.
pub enum PolicyError {
    #[error("namespace '{namespace}': {field} must be > 0")]
    ZeroTtl {
        namespace: String,
        field: &'static str,
    },

    #[error("namespace '{namespace}': {field} ({ttl:?}) exceeds the maximum of {max:?}")]
    TtlTooLong {
        namespace: String,
        field: &'static str,
        ttl: Duration,
        max: Duration,
    },

    #[error(
        "namespace '{namespace}': negative TTL ({negative:?}) must be shorter than distributed TTL ({distributed:?})"
    )]
    NegativeTtlNotShorter {
        namespace: String,
        negative: Duration,
        distributed: Duration,
    },

    #[error(
        "namespace '{namespace}': refresh interval ({refresh:?}) must be shorter than local write TTL ({write:?})"
    )]
    RefreshNotShorter {
        namespace: String,
        refresh: Duration,
        write: Duration,
    },

    #[error("namespace '{namespace}': {reason}")]
    ZeroCapacity { namespace: String, reason: String },

    #[error("invalid namespace: {reason}")]
    InvalidNamespace { reason: String },

    #[error("invalid key prefix '{prefix}': must not contain glob metacharacters")]
    InvalidPrefix { prefix: String },
}

/// Per-namespace tuning for both tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespacePolicy {
    pub local_write_ttl: Duration,
    pub local_access_ttl: Duration,
    /// `None` disables refresh-ahead.
    pub local_refresh_interval: Option<Duration>,
    pub distributed_ttl: Duration,
    pub negative_ttl: Duration,
    pub max_local_entries: u64,
    pub initial_local_capacity: usize,
}

impl Default for NamespacePolicy {
    fn default() -> Self {
        Self {
            local_write_ttl: DEFAULT_LOCAL_WRITE_TTL,
            local_access_ttl: DEFAULT_LOCAL_ACCESS_TTL,
            local_refresh_interval: Some(DEFAULT_LOCAL_REFRESH_INTERVAL),
            distributed_ttl: DEFAULT_DISTRIBUTED_TTL,
            negative_ttl: DEFAULT_NEGATIVE_TTL,
            max_local_entries: DEFAULT_MAX_LOCAL_ENTRIES,
            initial_local_capacity: DEFAULT_INITIAL_LOCAL_CAPACITY,
        }
    }
}

impl NamespacePolicy {
    pub fn local_write_ttl(mut self, ttl: Duration) -> Self {
        self.local_write_ttl = ttl;
        self
    }

    pub fn local_access_ttl(mut self, ttl: Duration) -> Self {
        self.local_access_ttl = ttl;
        self
    }

    pub fn local_refresh_interval(mut self, interval: Option<Duration>) -> Self {
        self.local_refresh_interval = interval;
        self
    }

    pub fn distributed_ttl(mut self, ttl: Duration) -> Self {
        self.distributed_ttl = ttl;
        self
    }

    pub fn negative_ttl(mut self, ttl: Duration) -> Self {
        self.negative_ttl = ttl;
        self
    }

    pub fn max_local_entries(mut self, max: u64) -> Self {
        self.max_local_entries = max;
        self
    }

    pub fn initial_local_capacity(mut self, capacity: usize) -> Self {
        self.initial_local_capacity = capacity;
        self
    }

    pub fn validate(&self, namespace: &str) -> Result<(), PolicyError> {
        let zero = |field: &'static str| PolicyError::ZeroTtl {
            namespace: namespace.to_string(),
            field,
        };
        if self.local_write_ttl.is_zero() {
            return Err(zero("local_write_ttl"));
        }
        if self.local_access_ttl.is_zero() {
            return Err(zero("local_access_ttl"));
        }
        if self.distributed_ttl.is_zero() {
            return Err(zero("distributed_ttl"));
        }
        // Redis TTLs have second granularity.
        if self.negative_ttl.as_secs() == 0 {
            return Err(zero("negative_ttl"));
        }
        let bounded = [
            ("local_write_ttl", Some(self.local_write_ttl)),
            ("local_access_ttl", Some(self.local_access_ttl)),
            ("local_refresh_interval", self.local_refresh_interval),
            ("distributed_ttl", Some(self.distributed_ttl)),
            ("negative_ttl", Some(self.negative_ttl)),
        ];
        for (field, ttl) in bounded {
            if let Some(ttl) = ttl.filter(|ttl| *ttl > MAX_TTL) {
                return Err(PolicyError::TtlTooLong {
                    namespace: namespace.to_string(),
                    field,
                    ttl,
                    max: MAX_TTL,
                });
            }
        }
        if self.negative_ttl >= self.distributed_ttl {
            return Err(PolicyError::NegativeTtlNotShorter {
                namespace: namespace.to_string(),
                negative: self.negative_ttl,
                distributed: self.distributed_ttl,
            });
        }
        if let Some(refresh) = self.local_refresh_interval {
            if refresh.is_zero() {
                return Err(zero("local_refresh_interval"));
            }
            if refresh >= self.local_write_ttl {
                return Err(PolicyError::RefreshNotShorter {
                    namespace: namespace.to_string(),
                    refresh,
                    write: self.local_write_ttl,
                });
            }
        }
        if self.max_local_entries == 0 {
            return Err(PolicyError::ZeroCapacity {
                namespace: namespace.to_string(),
                reason: "max_local_entries must be > 0".to_string(),
            });
        }
        if self.initial_local_capacity as u64 > self.max_local_entries {
            return Err(PolicyError::ZeroCapacity {
                namespace: namespace.to_string(),
                reason: format!(
                    "initial_local_capacity ({}) cannot exceed max_local_entries ({})",
                    self.initial_local_capacity, self.max_local_entries
                ),
            });
        }
        Ok(())
    }
}

/// The single shared namespace → policy table, plus the key prefix both tiers use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTable {
    key_prefix: String,
    default_policy: NamespacePolicy,
    namespaces: HashMap<String, NamespacePolicy>,
}

impl Default for PolicyTable {
    /// Default policy plus the built-in `user` and `userList` namespaces.
    fn default() -> Self {
        let base = NamespacePolicy::default();
        Self::new(base.clone())
            .with_namespace(
                USER_NAMESPACE,
                base.clone().distributed_ttl(USER_DISTRIBUTED_TTL),
            )
            .with_namespace(
                USER_LIST_NAMESPACE,
                base.distributed_ttl(USER_LIST_DISTRIBUTED_TTL),
            )
    }
}

impl PolicyTable {
    /// Creates an empty table where every namespace falls back to `default_policy`.
    pub fn new(default_policy: NamespacePolicy) -> Self {
        Self {
            key_prefix: String::new(),
            default_policy,
            namespaces: HashMap::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: &str, policy: NamespacePolicy) -> Self {
        self.namespaces.insert(namespace.to_string(), policy);
        self
    }

    pub fn with_key_prefix(mut self, prefix: &str) -> Self {
        self.key_prefix = prefix.to_string();
        self
    }

    pub fn set_namespace(&mut self, namespace: &str, policy: NamespacePolicy) {
        self.namespaces.insert(namespace.to_string(), policy);
    }

    #[inline]
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    #[inline]
    pub fn default_policy(&self) -> &NamespacePolicy {
        &self.default_policy
    }

    /// Policy for `namespace`, or the default if it was never configured.
    #[inline]
    pub fn policy(&self, namespace: &str) -> &NamespacePolicy {
        self.namespaces
            .get(namespace)
            .unwrap_or(&self.default_policy)
    }

    #[inline]
    pub fn is_configured(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    /// Configured namespace names, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.keys().cloned().collect();
        names.sort();
        names
    }

    #[inline]
    pub fn render(&self, key: &CacheKey) -> RenderedKey {
        key.render(&self.key_prefix)
    }

    /// `KEYS` pattern covering every entry of a namespace, negative markers included.
    pub fn namespace_pattern(&self, namespace: &str) -> String {
        format!("{}{namespace}{KEY_DELIMITER}*", self.key_prefix)
    }

    /// `KEYS` pattern covering only the negative markers of a namespace.
    pub fn negative_pattern(&self, namespace: &str) -> String {
        format!(
            "{}{namespace}{KEY_DELIMITER}{NEGATIVE_SEGMENT}{KEY_DELIMITER}*",
            self.key_prefix
        )
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.key_prefix.contains(GLOB_METACHARS) {
            return Err(PolicyError::InvalidPrefix {
                prefix: self.key_prefix.clone(),
            });
        }
        self.default_policy.validate("<default>")?;
        for (namespace, policy) in &self.namespaces {
            validate_namespace(namespace)
                .map_err(|reason| PolicyError::InvalidNamespace { reason })?;
            policy.validate(namespace)?;
        }
        Ok(())
    }
}
