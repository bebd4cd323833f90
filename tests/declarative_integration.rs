//! Integration tests for named caches and the maintenance sweeper.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::fixtures::{User, instance, seeded_origin, user, user_coordinator};
use strata::{
    CachedValue, DeclarativeCacheManager, InMemoryDistributedCache, LookupStatus,
    MaintenanceTask, NamespacePolicy, OriginError, PolicyTable,
};

fn page(ids: std::ops::RangeInclusive<u64>) -> Vec<User> {
    ids.map(user).collect()
}

#[tokio::test(start_paused = true)]
async fn test_list_page_computed_once_across_instances() {
    let store = Arc::new(InMemoryDistributedCache::new());
    let a = DeclarativeCacheManager::new(instance(&store, PolicyTable::default()));
    let b = DeclarativeCacheManager::new(instance(&store, PolicyTable::default()));
    let computed = Arc::new(AtomicUsize::new(0));

    let compute = |computed: Arc<AtomicUsize>| {
        move || async move {
            computed.fetch_add(1, Ordering::SeqCst);
            Ok::<_, OriginError>(Some(page(1..=10)))
        }
    };

    let first = a
        .cache("userList")
        .expect("cache")
        .get_or_compute("page:1", compute(Arc::clone(&computed)))
        .await;
    assert_eq!(first.status(), LookupStatus::Loaded);

    let second = b
        .cache("userList")
        .expect("cache")
        .get_or_compute("page:1", compute(Arc::clone(&computed)))
        .await;
    assert_eq!(second.status(), LookupStatus::HitL2);
    assert_eq!(second.into_value(), Some(page(1..=10)));

    assert_eq!(computed.load(Ordering::SeqCst), 1);
    assert_eq!(store.ttl("userList:page:1"), Some(Duration::from_secs(600)));
}

#[tokio::test]
async fn test_named_cache_and_coordinator_share_entries() {
    let store = Arc::new(InMemoryDistributedCache::new());
    let tiers = instance(&store, PolicyTable::default());
    let origin = seeded_origin();
    let coordinator = user_coordinator(&tiers, &origin);
    let users = DeclarativeCacheManager::new(tiers.clone()).cache("user").expect("cache");

    users.put("5", &user(5)).await.expect("put");
    assert_eq!(coordinator.lookup("5").await.status(), LookupStatus::HitL1);
    assert_eq!(origin.load_count(), 0);

    coordinator.get("404").await;
    assert_eq!(users.get::<User>("404").await, Some(CachedValue::Absent));

    users.evict("404").await.expect("evict");
    assert_eq!(users.get::<User>("404").await, None);
}

#[tokio::test(start_paused = true)]
async fn test_custom_namespace_policy_applies_to_named_cache() {
    let store = Arc::new(InMemoryDistributedCache::new());
    let policy = PolicyTable::default().with_namespace(
        "sessions",
        NamespacePolicy::default()
            .distributed_ttl(Duration::from_secs(90))
            .negative_ttl(Duration::from_secs(15)),
    );
    let manager = DeclarativeCacheManager::new(instance(&store, policy));
    let sessions = manager.cache("sessions").expect("cache");

    sessions.put("abc", &"token".to_string()).await.expect("put");
    let missing = sessions
        .get_or_compute::<String, _, _>("gone", || async { Ok(None) })
        .await;
    assert_eq!(missing.status(), LookupStatus::NotFound);

    assert_eq!(store.ttl("sessions:abc"), Some(Duration::from_secs(90)));
    assert_eq!(store.ttl("sessions:null:gone"), Some(Duration::from_secs(15)));
    assert!(manager.cache_names().contains(&"sessions".to_string()));
}

#[tokio::test]
async fn test_maintenance_purges_markers_of_every_instance() {
    let store = Arc::new(InMemoryDistributedCache::new());
    let origin = seeded_origin();
    let a = user_coordinator(&instance(&store, PolicyTable::default()), &origin);
    let b = user_coordinator(&instance(&store, PolicyTable::default()), &origin);

    a.get("100").await;
    b.get("101").await;
    a.get("1").await;
    assert_eq!(store.len(), 3);

    let sweeper_tiers = instance(&store, PolicyTable::default());
    let report = MaintenanceTask::new(sweeper_tiers, Duration::from_secs(60))
        .run_once()
        .await;
    assert!(report.is_clean());
    assert_eq!(report.total_purged(), 2);
    assert_eq!(store.len(), 1);

    // With the markers gone the next read asks the origin again.
    origin.insert(user(100));
    assert_eq!(b.lookup("100").await.status(), LookupStatus::Loaded);
}
