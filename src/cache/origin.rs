//! Authoritative data source behind the tiers.

use thiserror::Error;

use super::types::Cacheable;

#[derive(Debug, Error)]
pub enum OriginError {
    #[error("origin unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("origin query failed: {reason}")]
    Query { reason: String },
}

/// Loads entities by identifier.
///
/// `load` must be idempotent and side-effect free; `Ok(None)` means the entity
/// is confirmed absent and will be negatively cached.
pub trait OriginStore: Send + Sync + 'static {
    type Entity: Cacheable;

    fn load(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Self::Entity>, OriginError>> + Send;
}

#[cfg(any(test, feature = "mock"))]
pub use mock::MockOriginStore;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use parking_lot::RwLock;

    use super::{OriginError, OriginStore};
    use crate::cache::types::Cacheable;

    /// In-memory origin that counts loads and can be slowed down or failed.
    pub struct MockOriginStore<V> {
        rows: Arc<RwLock<HashMap<String, V>>>,
        loads: Arc<AtomicUsize>,
        delay: Option<Duration>,
        failing: Arc<AtomicBool>,
    }

    impl<V> Clone for MockOriginStore<V> {
        fn clone(&self) -> Self {
            Self {
                rows: Arc::clone(&self.rows),
                loads: Arc::clone(&self.loads),
                delay: self.delay,
                failing: Arc::clone(&self.failing),
            }
        }
    }

    impl<V: Cacheable> Default for MockOriginStore<V> {
        fn default() -> Self {
            Self {
                rows: Arc::new(RwLock::new(HashMap::new())),
                loads: Arc::new(AtomicUsize::new(0)),
                delay: None,
                failing: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl<V: Cacheable> MockOriginStore<V> {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every load sleeps for `delay` first (widens stampede windows in tests).
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn insert(&self, value: V) {
            self.rows.write().insert(value.cache_id(), value);
        }

        pub fn remove(&self, id: &str) -> Option<V> {
            self.rows.write().remove(id)
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn load_count(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }

        pub fn reset_load_count(&self) {
            self.loads.store(0, Ordering::SeqCst);
        }
    }

    impl<V: Cacheable> OriginStore for MockOriginStore<V> {
        type Entity = V;

        async fn load(&self, id: &str) -> Result<Option<V>, OriginError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(OriginError::Unavailable {
                    reason: "mock origin failing".to_string(),
                });
            }
            Ok(self.rows.read().get(id).cloned())
        }
    }
}
