use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::{CacheError, CacheResult};
use crate::constants::{GLOB_METACHARS, KEY_DELIMITER, NEGATIVE_SEGMENT};

/// Values that can ride in both tiers: cloneable for L1, serializable for L2.
pub trait CacheValue: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// An entity that knows its own cache identifier (used by `put`).
pub trait Cacheable: CacheValue {
    fn cache_id(&self) -> String;
}

/// `{namespace, id}` pair. Construction validates both halves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: String,
    id: String,
}

impl CacheKey {
    pub fn new(namespace: impl Into<String>, id: impl Into<String>) -> CacheResult<Self> {
        let namespace = namespace.into();
        let id = id.into();
        validate_namespace(&namespace).map_err(|reason| CacheError::InvalidKey { reason })?;
        validate_id(&id).map_err(|reason| CacheError::InvalidKey { reason })?;
        Ok(Self { namespace, id })
    }

    #[inline]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Renders the positive and negative-marker keys under `prefix`.
    pub fn render(&self, prefix: &str) -> RenderedKey {
        RenderedKey {
            positive: format!("{prefix}{}{KEY_DELIMITER}{}", self.namespace, self.id),
            negative: format!(
                "{prefix}{}{KEY_DELIMITER}{NEGATIVE_SEGMENT}{KEY_DELIMITER}{}",
                self.namespace, self.id
            ),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{KEY_DELIMITER}{}", self.namespace, self.id)
    }
}

/// The two string keys a [`CacheKey`] occupies in the distributed tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedKey {
    pub positive: String,
    pub negative: String,
}

pub(crate) fn validate_namespace(namespace: &str) -> Result<(), String> {
    if namespace.is_empty() {
        return Err("namespace must not be empty".to_string());
    }
    if let Some(c) = namespace
        .chars()
        .find(|c| *c == KEY_DELIMITER || c.is_whitespace() || GLOB_METACHARS.contains(c))
    {
        return Err(format!("namespace '{namespace}' contains reserved character {c:?}"));
    }
    Ok(())
}

fn validate_id(id: &str) -> Result<(), String> {
    if id.trim().is_empty() {
        return Err("identifier must not be empty".to_string());
    }
    if id.chars().any(char::is_control) {
        return Err("identifier must not contain control characters".to_string());
    }
    // Would collide with the negative-marker variant of another id.
    if id
        .strip_prefix(NEGATIVE_SEGMENT)
        .is_some_and(|rest| rest.starts_with(KEY_DELIMITER))
    {
        return Err(format!("identifier '{id}' collides with the negative-marker keyspace"));
    }
    Ok(())
}

/// Payload of a cache entry: a real value or confirmed absence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachedValue<T> {
    Present(T),
    Absent,
}

impl<T> CachedValue<T> {
    #[inline]
    pub fn is_present(&self) -> bool {
        matches!(self, CachedValue::Present(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            CachedValue::Present(value) => Some(value),
            CachedValue::Absent => None,
        }
    }
}

/// What the distributed tier stores. Entries are replaced or removed, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: CachedValue<T>,
    /// Unix milliseconds at write time.
    pub stored_at: i64,
    pub ttl_secs: u64,
}

impl<T> CacheEntry<T> {
    pub fn present(value: T, ttl: Duration) -> Self {
        Self {
            value: CachedValue::Present(value),
            stored_at: chrono::Utc::now().timestamp_millis(),
            ttl_secs: ttl.as_secs(),
        }
    }

    pub fn absent(ttl: Duration) -> Self {
        Self {
            value: CachedValue::Absent,
            stored_at: chrono::Utc::now().timestamp_millis(),
            ttl_secs: ttl.as_secs(),
        }
    }

    #[inline]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        !self.value.is_present()
    }
}

/// Where a read was answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupStatus {
    HitL1,
    HitL2,
    /// A negative marker in L2 answered "confirmed absent".
    HitNegative,
    /// Loaded from origin under the lock and written to the tiers.
    Loaded,
    /// Origin confirmed absence; a negative marker was written.
    NotFound,
    /// Origin load without touching the tiers (L2 down or lock wait timed out).
    Bypassed,
    OriginUnavailable,
    InvalidKey,
}

impl LookupStatus {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupStatus::HitL1 => "HIT_L1",
            LookupStatus::HitL2 => "HIT_L2",
            LookupStatus::HitNegative => "HIT_NEGATIVE",
            LookupStatus::Loaded => "LOADED",
            LookupStatus::NotFound => "NOT_FOUND",
            LookupStatus::Bypassed => "BYPASSED",
            LookupStatus::OriginUnavailable => "ORIGIN_UNAVAILABLE",
            LookupStatus::InvalidKey => "INVALID_KEY",
        }
    }

    /// Answered from a cache tier without an origin call.
    #[inline]
    pub fn is_cache_hit(&self) -> bool {
        matches!(
            self,
            LookupStatus::HitL1 | LookupStatus::HitL2 | LookupStatus::HitNegative
        )
    }
}

impl std::fmt::Display for LookupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a read-through lookup.
#[derive(Debug, Clone)]
pub struct Lookup<V> {
    status: LookupStatus,
    value: Option<V>,
}

impl<V> Lookup<V> {
    pub(crate) fn new(status: LookupStatus, value: Option<V>) -> Self {
        Self { status, value }
    }

    pub(crate) fn empty(status: LookupStatus) -> Self {
        Self {
            status,
            value: None,
        }
    }

    #[inline]
    pub fn status(&self) -> LookupStatus {
        self.status
    }

    #[inline]
    pub fn is_found(&self) -> bool {
        self.value.is_some()
    }

    #[inline]
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<V> {
        self.value
    }
}
