//! Cross-cutting, shared constants.
//!
//! Default TTLs mirror the policy the service shipped with: a short-lived local
//! tier in front of a longer-lived distributed tier, with negative markers that
//! always expire before positive entries.

use std::time::Duration;

/// Separator between key segments (`{prefix}{namespace}:{id}`).
pub const KEY_DELIMITER: char = ':';

/// Segment inserted between namespace and id for negative-marker keys.
pub const NEGATIVE_SEGMENT: &str = "null";

pub const DEFAULT_LOCAL_WRITE_TTL: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_LOCAL_ACCESS_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_LOCAL_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_DISTRIBUTED_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_NEGATIVE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_MAX_LOCAL_ENTRIES: u64 = 1_000;
pub const DEFAULT_INITIAL_LOCAL_CAPACITY: usize = 100;

/// Longest TTL any tier accepts (one year).
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Namespace for single-entity user lookups.
pub const USER_NAMESPACE: &str = "user";
pub const USER_DISTRIBUTED_TTL: Duration = Duration::from_secs(30 * 60);

/// Namespace for paged user listings.
pub const USER_LIST_NAMESPACE: &str = "userList";
pub const USER_LIST_DISTRIBUTED_TTL: Duration = Duration::from_secs(10 * 60);

/// Upper bound on waiting for the load lock before falling back to an uncached load.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(15 * 60);

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Characters with meaning inside a `KEYS` glob; banned from namespaces and prefixes.
pub const GLOB_METACHARS: &[char] = &['*', '?', '[', ']', '\\'];
