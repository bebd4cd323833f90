//! In-process distributed tier.
//!
//! Behaves like a single Redis node (per-key TTL, glob `KEYS`) inside one process.
//! Used for single-node deployments and tests. Expiry runs on the tokio clock,
//! so paused-time tests can step through TTL windows.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

use super::error::{DistributedCacheError, DistributedCacheResult};

struct StoredValue {
    bytes: Vec<u8>,
    expires_at: Instant,
}

impl StoredValue {
    #[inline]
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Per-command call counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpCounts {
    pub gets: u64,
    pub sets: u64,
    pub deletes: u64,
    pub scans: u64,
}

#[derive(Default)]
pub struct InMemoryDistributedCache {
    entries: RwLock<HashMap<String, StoredValue>>,
    unavailable: AtomicBool,
    gets: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    scans: AtomicU64,
}

impl InMemoryDistributedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage: every command fails with `Unavailable` until reset.
    #[cfg(any(test, feature = "mock"))]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub(crate) fn check_available(&self) -> DistributedCacheResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DistributedCacheError::Unavailable {
                reason: "in-memory store marked unavailable".to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn get_bytes(&self, key: &str) -> DistributedCacheResult<Option<Vec<u8>>> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        self.check_available()?;
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return Ok(None),
                Some(stored) if !stored.is_expired(now) => return Ok(Some(stored.bytes.clone())),
                Some(_) => {}
            }
        }
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|s| s.is_expired(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    pub(crate) fn set_bytes(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> DistributedCacheResult<()> {
        self.sets.fetch_add(1, Ordering::Relaxed);
        self.check_available()?;
        if ttl.is_zero() {
            return Err(DistributedCacheError::Command {
                reason: format!("invalid expire time for '{key}'"),
            });
        }
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            return Err(DistributedCacheError::Command {
                reason: format!("expire time out of range for '{key}'"),
            });
        };
        self.entries.write().insert(
            key.to_string(),
            StoredValue {
                bytes: value,
                expires_at,
            },
        );
        Ok(())
    }

    pub(crate) fn delete_key(&self, key: &str) -> DistributedCacheResult<bool> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        self.check_available()?;
        let now = Instant::now();
        Ok(self
            .entries
            .write()
            .remove(key)
            .is_some_and(|s| !s.is_expired(now)))
    }

    pub(crate) fn matching_keys(&self, pattern: &str) -> DistributedCacheResult<Vec<String>> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        self.check_available()?;
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .read()
            .iter()
            .filter(|(k, v)| !v.is_expired(now) && glob_match(pattern, k))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Remaining TTL of `key`, or `None` if absent/expired.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .read()
            .get(key)
            .filter(|s| !s.is_expired(now))
            .map(|s| s.expires_at - now)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.ttl(key).is_some()
    }

    /// Number of unexpired keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .values()
            .filter(|s| !s.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops expired keys; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, v| !v.is_expired(now));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn op_counts(&self) -> OpCounts {
        OpCounts {
            gets: self.gets.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            scans: self.scans.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for InMemoryDistributedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDistributedCache")
            .field("entries", &self.entries.read().len())
            .field("unavailable", &self.unavailable.load(Ordering::Relaxed))
            .finish()
    }
}

/// Redis-style glob: `*` any run, `?` one char, `\x` literal `x`.
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        match p.get(pi) {
            Some('*') => {
                backtrack = Some((pi, ti));
                pi += 1;
                continue;
            }
            Some('?') => {
                pi += 1;
                ti += 1;
                continue;
            }
            Some('\\') if pi + 1 < p.len() && p[pi + 1] == t[ti] => {
                pi += 2;
                ti += 1;
                continue;
            }
            Some(c) if *c != '\\' && *c == t[ti] => {
                pi += 1;
                ti += 1;
                continue;
            }
            _ => {}
        }
        match backtrack {
            Some((star_pi, star_ti)) => {
                pi = star_pi + 1;
                ti = star_ti + 1;
                backtrack = Some((star_pi, star_ti + 1));
            }
            None => return false,
        }
    }

    p[pi..].iter().all(|c| *c == '*')
}
