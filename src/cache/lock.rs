//! Load locks: at most one origin load in flight per key (or per process).
//!
//! [`LockMode::PerKey`] keeps a table of key → mutex, created on demand and
//! evicted once no caller references it. [`LockMode::Global`] serializes every
//! load in the process through one mutex.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    Global,
    #[default]
    PerKey,
}

impl FromStr for LockMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(LockMode::Global),
            "per_key" | "per-key" | "perkey" => Ok(LockMode::PerKey),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LockError {
    #[error("timed out after {waited:?} waiting for load lock on '{key}'")]
    Timeout { key: String, waited: Duration },
}

type LockTable = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// A caller's claim on a per-key table entry. Dropping it evicts the entry if
/// nobody else references the mutex, whether the lock was held, timed out, or
/// the wait was abandoned.
struct LockSlot {
    table: LockTable,
    key: String,
}

impl Drop for LockSlot {
    fn drop(&mut self) {
        evict_if_unreferenced(&self.table, &self.key);
    }
}

/// Held while a caller owns the load lock for a key.
pub struct KeyLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    slot: Option<LockSlot>,
}

impl Drop for KeyLockGuard {
    fn drop(&mut self) {
        // Release the mutex before checking whether anyone else still references it.
        drop(self.guard.take());
        drop(self.slot.take());
    }
}

impl std::fmt::Debug for KeyLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLockGuard")
            .field("key", &self.slot.as_ref().map(|slot| slot.key.as_str()))
            .finish()
    }
}

fn evict_if_unreferenced(table: &LockTable, key: &str) {
    table.remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
}

pub struct KeyLocks {
    mode: LockMode,
    timeout: Option<Duration>,
    global: Arc<Mutex<()>>,
    table: LockTable,
}

impl KeyLocks {
    /// `timeout` of `None` waits indefinitely.
    pub fn new(mode: LockMode, timeout: Option<Duration>) -> Self {
        Self {
            mode,
            timeout,
            global: Arc::new(Mutex::new(())),
            table: Arc::new(DashMap::new()),
        }
    }

    #[inline]
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Live per-key mutexes (always 0 in global mode).
    #[inline]
    pub fn active_keys(&self) -> usize {
        self.table.len()
    }

    /// Waits (bounded by the configured timeout) for the load lock on `key`.
    pub async fn acquire(&self, key: &str) -> Result<KeyLockGuard, LockError> {
        match self.mode {
            LockMode::Global => {
                let guard = self.wait(key, Arc::clone(&self.global)).await?;
                Ok(KeyLockGuard {
                    guard: Some(guard),
                    slot: None,
                })
            }
            LockMode::PerKey => {
                let mutex = Arc::clone(
                    self.table
                        .entry(key.to_string())
                        .or_insert_with(|| Arc::new(Mutex::new(())))
                        .value(),
                );
                // Declared before the wait so it drops after the wait's mutex
                // reference on every exit path.
                let slot = LockSlot {
                    table: Arc::clone(&self.table),
                    key: key.to_string(),
                };
                let guard = self.wait(key, mutex).await?;
                Ok(KeyLockGuard {
                    guard: Some(guard),
                    slot: Some(slot),
                })
            }
        }
    }

    async fn wait(&self, key: &str, mutex: Arc<Mutex<()>>) -> Result<OwnedMutexGuard<()>, LockError> {
        match self.timeout {
            None => Ok(mutex.lock_owned().await),
            Some(limit) => tokio::time::timeout(limit, mutex.lock_owned())
                .await
                .map_err(|_| LockError::Timeout {
                    key: key.to_string(),
                    waited: limit,
                }),
        }
    }
}

impl std::fmt::Debug for KeyLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLocks")
            .field("mode", &self.mode)
            .field("timeout", &self.timeout)
            .field("active_keys", &self.table.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_mode_parse() {
        assert_eq!("global".parse::<LockMode>(), Ok(LockMode::Global));
        assert_eq!("PER_KEY".parse::<LockMode>(), Ok(LockMode::PerKey));
        assert_eq!("per-key".parse::<LockMode>(), Ok(LockMode::PerKey));
        assert!("striped".parse::<LockMode>().is_err());
    }

    #[tokio::test]
    async fn test_per_key_entry_evicted_after_release() {
        let locks = KeyLocks::new(LockMode::PerKey, None);
        let guard = locks.acquire("user:1").await.expect("acquire");
        assert_eq!(locks.active_keys(), 1);
        drop(guard);
        assert_eq!(locks.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_unrelated_keys_do_not_block() {
        let locks = KeyLocks::new(LockMode::PerKey, Some(Duration::from_millis(50)));
        let _a = locks.acquire("user:1").await.expect("acquire a");
        let b = locks.acquire("user:2").await;
        assert!(b.is_ok());
        assert_eq!(locks.active_keys(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_times_out() {
        let locks = KeyLocks::new(LockMode::PerKey, Some(Duration::from_millis(100)));
        let _held = locks.acquire("user:1").await.expect("acquire");

        let err = locks.acquire("user:1").await.expect_err("should time out");
        assert_eq!(
            err,
            LockError::Timeout {
                key: "user:1".to_string(),
                waited: Duration::from_millis(100),
            }
        );
        // The holder still references the slot.
        assert_eq!(locks.active_keys(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_mode_serializes_unrelated_keys() {
        let locks = KeyLocks::new(LockMode::Global, Some(Duration::from_millis(100)));
        let _held = locks.acquire("user:1").await.expect("acquire");

        let err = locks.acquire("user:2").await;
        assert!(matches!(err, Err(LockError::Timeout { .. })));
        assert_eq!(locks.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_leak_entry() {
        let locks = KeyLocks::new(LockMode::PerKey, None);
        let held = locks.acquire("k").await.expect("acquire");

        let mut waiter = Box::pin(locks.acquire("k"));
        assert!(futures_util::poll!(waiter.as_mut()).is_pending());

        // The waiter is now the only other reference to the slot.
        drop(held);
        assert_eq!(locks.active_keys(), 1);

        drop(waiter);
        assert_eq!(locks.active_keys(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_wait_under_caller_timeout() {
        let locks = KeyLocks::new(LockMode::PerKey, None);
        let held = locks.acquire("k").await.expect("acquire");

        let abandoned = tokio::time::timeout(Duration::from_millis(10), locks.acquire("k")).await;
        assert!(abandoned.is_err());
        assert_eq!(locks.active_keys(), 1);

        drop(held);
        assert_eq!(locks.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_waiter_acquires_after_release() {
        let locks = Arc::new(KeyLocks::new(LockMode::PerKey, None));
        let held = locks.acquire("k").await.expect("acquire");

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move { locks.acquire("k").await.map(|_| ()) })
        };
        tokio::task::yield_now().await;
        drop(held);

        waiter.await.expect("join").expect("acquire after release");
        assert_eq!(locks.active_keys(), 0);
    }
}
