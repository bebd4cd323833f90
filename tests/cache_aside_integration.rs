//! Integration tests for the cache-aside read path across simulated processes.
//!
//! Each "instance" owns its L1, lock table and counters; all instances share
//! one in-memory distributed store, the way several services share Redis.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::fixtures::{
    SEEDED_USER_COUNT, UserBuilder, instance, seeded_origin, user, user_coordinator,
};
use strata::{
    CachedValue, DistributedCache, InMemoryDistributedCache, LookupStatus, PolicyTable,
    decode_entry,
};

#[tokio::test]
async fn test_second_instance_reads_first_instance_load() {
    let store = Arc::new(InMemoryDistributedCache::new());
    let origin = seeded_origin();
    let a = user_coordinator(&instance(&store, PolicyTable::default()), &origin);
    let b = user_coordinator(&instance(&store, PolicyTable::default()), &origin);

    assert_eq!(a.lookup("42").await.status(), LookupStatus::Loaded);
    assert_eq!(b.lookup("42").await.status(), LookupStatus::HitL2);
    assert_eq!(b.lookup("42").await.status(), LookupStatus::HitL1);

    assert_eq!(b.get("42").await, Some(user(42)));
    assert_eq!(origin.load_count(), 1);
}

#[tokio::test]
async fn test_stored_entry_is_a_self_describing_envelope() {
    let store = Arc::new(InMemoryDistributedCache::new());
    let origin = seeded_origin();
    let coordinator = user_coordinator(&instance(&store, PolicyTable::default()), &origin);

    coordinator.get("7").await;

    let bytes = store.get("user:7").await.expect("get").expect("stored");
    let entry = decode_entry::<common::fixtures::User>(&bytes).expect("decode");
    assert_eq!(entry.value, CachedValue::Present(user(7)));
    assert_eq!(entry.ttl(), Duration::from_secs(1800));
    assert!(!entry.is_negative());
    assert!(entry.stored_at > 0);
}

#[tokio::test]
async fn test_absent_row_is_shared_as_negative_marker() {
    let store = Arc::new(InMemoryDistributedCache::new());
    let origin = seeded_origin();
    let a = user_coordinator(&instance(&store, PolicyTable::default()), &origin);
    let b = user_coordinator(&instance(&store, PolicyTable::default()), &origin);

    assert_eq!(a.lookup("999").await.status(), LookupStatus::NotFound);
    assert_eq!(b.lookup("999").await.status(), LookupStatus::HitNegative);
    assert_eq!(origin.load_count(), 1);

    let bytes = store.get("user:null:999").await.expect("get").expect("marker");
    assert!(decode_entry::<common::fixtures::User>(&bytes).expect("decode").is_negative());
    assert!(!store.contains("user:999"));
}

#[tokio::test]
async fn test_put_after_create_supersedes_negative_marker() {
    let store = Arc::new(InMemoryDistributedCache::new());
    let origin = seeded_origin();
    let a = user_coordinator(&instance(&store, PolicyTable::default()), &origin);
    let b = user_coordinator(&instance(&store, PolicyTable::default()), &origin);

    assert_eq!(b.get("999").await, None);

    let created = UserBuilder::new().id(999).name("late").build();
    origin.insert(created.clone());
    a.put(&created).await.expect("put");

    let lookup = b.lookup("999").await;
    assert_eq!(lookup.status(), LookupStatus::HitL2);
    assert_eq!(lookup.into_value(), Some(created));
}

#[tokio::test]
async fn test_key_prefix_applies_to_every_key() {
    let store = Arc::new(InMemoryDistributedCache::new());
    let origin = seeded_origin();
    let policy = PolicyTable::default().with_key_prefix("app:");
    let tiers = instance(&store, policy);
    let coordinator = user_coordinator(&tiers, &origin);

    coordinator.get("1").await;
    coordinator.get("404").await;

    assert!(store.contains("app:user:1"));
    assert!(store.contains("app:user:null:404"));
    assert!(!store.contains("user:1"));

    assert_eq!(coordinator.purge_negative_markers().await.expect("purge"), 1);
    assert_eq!(coordinator.invalidate_namespace().await.expect("clear"), 1);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_batch_operations_span_instances() {
    let store = Arc::new(InMemoryDistributedCache::new());
    let origin = seeded_origin();
    let a = user_coordinator(&instance(&store, PolicyTable::default()), &origin);
    let b = user_coordinator(&instance(&store, PolicyTable::default()), &origin);

    let ids: Vec<String> = (1..=SEEDED_USER_COUNT).map(|id| id.to_string()).collect();
    assert_eq!(a.warm_up(&ids).await, ids.len());
    assert_eq!(origin.load_count(), ids.len());

    let users = b.get_many(&["1", "25", "500"]).await;
    assert_eq!(users, vec![Some(user(1)), Some(user(25)), None]);
    assert_eq!(origin.load_count(), ids.len() + 1);

    let report = a.invalidate_many(&["1", "25"]).await;
    assert!(report.is_complete());
    assert_eq!(report.invalidated, 2);
    assert!(!store.contains("user:1"));
    assert!(store.contains("user:2"));
}

#[tokio::test]
async fn test_outage_degrades_then_recovers() {
    let store = Arc::new(InMemoryDistributedCache::new());
    let origin = seeded_origin();
    let tiers = instance(&store, PolicyTable::default());
    let coordinator = user_coordinator(&tiers, &origin);

    store.set_unavailable(true);
    assert!(!tiers.is_ready().await);
    let lookup = coordinator.lookup("3").await;
    assert_eq!(lookup.status(), LookupStatus::Bypassed);
    assert_eq!(lookup.into_value(), Some(user(3)));
    assert!(coordinator.put(&user(3)).await.is_err());

    store.set_unavailable(false);
    assert!(tiers.is_ready().await);
    assert_eq!(coordinator.lookup("3").await.status(), LookupStatus::Loaded);
    assert_eq!(coordinator.lookup("3").await.status(), LookupStatus::HitL1);

    let stats = coordinator.stats();
    assert_eq!(stats.degraded_reads, 1);
    assert_eq!(stats.l1_hits, 1);
}
