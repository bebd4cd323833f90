//! Test fixtures for integration tests.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strata::{
    CacheCoordinator, CacheTiers, Cacheable, InMemoryDistributedCache, MockCacheTiers,
    MockOriginStore, PolicyTable,
};

pub const USER_NAMESPACE: &str = strata::constants::USER_NAMESPACE;

pub const SEEDED_USER_COUNT: u64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

impl Cacheable for User {
    fn cache_id(&self) -> String {
        self.id.to_string()
    }
}

pub type UserCoordinator = CacheCoordinator<MockOriginStore<User>, Arc<InMemoryDistributedCache>>;

#[derive(Default)]
pub struct UserBuilder {
    id: Option<u64>,
    name: Option<String>,
    email: Option<String>,
}

impl UserBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn build(self) -> User {
        let id = self.id.unwrap_or(1);
        User {
            id,
            name: self.name.unwrap_or_else(|| format!("user-{id}")),
            email: self.email.unwrap_or_else(|| format!("user-{id}@example.com")),
        }
    }
}

pub fn user(id: u64) -> User {
    UserBuilder::new().id(id).build()
}

/// Origin holding users `1..=SEEDED_USER_COUNT`.
pub fn seeded_origin() -> MockOriginStore<User> {
    let origin = MockOriginStore::new();
    for id in 1..=SEEDED_USER_COUNT {
        origin.insert(user(id));
    }
    origin
}

/// One "process": its own L1, lock table and counters over `store`.
pub fn instance(store: &Arc<InMemoryDistributedCache>, policy: PolicyTable) -> MockCacheTiers {
    CacheTiers::new_mock_with_store(policy, Arc::clone(store)).expect("tiers")
}

pub fn user_coordinator(tiers: &MockCacheTiers, origin: &MockOriginStore<User>) -> UserCoordinator {
    CacheCoordinator::new(tiers.clone(), USER_NAMESPACE, origin.clone()).expect("coordinator")
}
