use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::memory::glob_match;
use super::*;
use crate::cache::policy::{NamespacePolicy, PolicyTable};
use crate::cache::types::CacheKey;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Profile {
    id: u64,
    name: String,
}

fn profile(id: u64) -> Profile {
    Profile {
        id,
        name: format!("user-{id}"),
    }
}

fn manager() -> DistributedCacheManager<Arc<InMemoryDistributedCache>> {
    let policy = PolicyTable::default().with_namespace(
        "user",
        NamespacePolicy::default()
            .distributed_ttl(Duration::from_secs(1800))
            .negative_ttl(Duration::from_secs(300)),
    );
    DistributedCacheManager::new(Arc::new(InMemoryDistributedCache::new()), Arc::new(policy))
}

#[test]
fn test_glob_match() {
    assert!(glob_match("user:*", "user:42"));
    assert!(glob_match("user:*", "user:null:42"));
    assert!(!glob_match("user:*", "userList:1"));
    assert!(glob_match("user:null:*", "user:null:9"));
    assert!(!glob_match("user:null:*", "user:9"));
    assert!(glob_match("a?c", "abc"));
    assert!(!glob_match("a?c", "ac"));
    assert!(glob_match("*", ""));
    assert!(glob_match("a\\*b", "a*b"));
    assert!(!glob_match("a\\*b", "axb"));
    assert!(glob_match("*:*:*", "x:y:z"));
}

#[tokio::test(start_paused = true)]
async fn test_in_memory_ttl_expiry() {
    let store = InMemoryDistributedCache::new();
    store
        .set("k", b"v".to_vec(), Duration::from_secs(10))
        .await
        .expect("set");

    assert_eq!(store.get("k").await.expect("get"), Some(b"v".to_vec()));
    assert_eq!(store.ttl("k"), Some(Duration::from_secs(10)));

    tokio::time::advance(Duration::from_secs(9)).await;
    assert!(store.get("k").await.expect("get").is_some());

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(store.get("k").await.expect("get").is_none());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_in_memory_rejects_zero_ttl() {
    let store = InMemoryDistributedCache::new();
    let result = store.set("k", b"v".to_vec(), Duration::ZERO).await;
    assert!(matches!(result, Err(DistributedCacheError::Command { .. })));
}

#[tokio::test]
async fn test_in_memory_rejects_out_of_range_ttl() {
    let store = InMemoryDistributedCache::new();
    let result = store.set("k", b"v".to_vec(), Duration::MAX).await;
    assert!(matches!(result, Err(DistributedCacheError::Command { .. })));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_in_memory_keys_and_delete() {
    let store = InMemoryDistributedCache::new();
    for key in ["user:1", "user:2", "user:null:3", "userList:1"] {
        store
            .set(key, b"x".to_vec(), Duration::from_secs(60))
            .await
            .expect("set");
    }

    let keys = store.keys("user:*").await.expect("keys");
    assert_eq!(keys, vec!["user:1", "user:2", "user:null:3"]);

    assert!(store.delete("user:1").await.expect("delete"));
    assert!(!store.delete("user:1").await.expect("delete"));
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn test_in_memory_unavailable() {
    let store = InMemoryDistributedCache::new();
    store.set_unavailable(true);

    assert!(!store.is_ready().await);
    let err = store.get("k").await.expect_err("should fail");
    assert!(err.is_unavailable());
    assert!(store.delete("k").await.is_err());

    store.set_unavailable(false);
    assert!(store.is_ready().await);
}

#[tokio::test(start_paused = true)]
async fn test_manager_present_roundtrip() {
    let manager = manager();
    let key = CacheKey::new("user", "42").expect("key").render("");

    manager
        .store_present("user", &key, &profile(42))
        .await
        .expect("store");

    let stored: Stored<Profile> = manager.fetch(&key).await.expect("fetch");
    assert_eq!(stored, Stored::Present(profile(42)));
    assert_eq!(
        manager.backend().ttl("user:42"),
        Some(Duration::from_secs(1800))
    );
}

#[tokio::test(start_paused = true)]
async fn test_manager_negative_marker_uses_negative_ttl() {
    let manager = manager();
    let key = CacheKey::new("user", "999").expect("key").render("");

    manager.store_negative("user", &key).await.expect("store");

    let stored: Stored<Profile> = manager.fetch(&key).await.expect("fetch");
    assert_eq!(stored, Stored::Negative);
    assert!(!manager.backend().contains("user:999"));
    assert_eq!(
        manager.backend().ttl("user:null:999"),
        Some(Duration::from_secs(300))
    );
}

#[tokio::test]
async fn test_manager_fetch_miss_checks_both_keys() {
    let manager = manager();
    let key = CacheKey::new("user", "1").expect("key").render("");

    let stored: Stored<Profile> = manager.fetch(&key).await.expect("fetch");
    assert_eq!(stored, Stored::Miss);
    assert_eq!(manager.backend().op_counts().gets, 2);
}

#[tokio::test]
async fn test_manager_undecodable_entry_is_a_miss() {
    let manager = manager();
    let key = CacheKey::new("user", "5").expect("key").render("");
    manager
        .backend()
        .set("user:5", b"{broken".to_vec(), Duration::from_secs(60))
        .await
        .expect("set");

    let stored: Stored<Profile> = manager.fetch(&key).await.expect("fetch");
    assert_eq!(stored, Stored::Miss);
}

#[tokio::test]
async fn test_manager_sweep() {
    let manager = manager();
    for id in ["1", "2"] {
        let key = CacheKey::new("user", id).expect("key").render("");
        manager
            .store_present("user", &key, &profile(1))
            .await
            .expect("store");
        manager.store_negative("user", &key).await.expect("store");
    }

    let purged = manager.sweep("user:null:*").await.expect("sweep");
    assert_eq!(purged, 2);
    assert_eq!(manager.backend().len(), 2);

    let cleared = manager.sweep("user:*").await.expect("sweep");
    assert_eq!(cleared, 2);
    assert!(manager.backend().is_empty());
}
