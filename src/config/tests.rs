use super::*;
use crate::cache::PolicyError;
use serial_test::serial;
use std::env;
use std::time::Duration;

fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, value) in vars {
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, _) in vars {
        unsafe { env::remove_var(key) };
    }

    result
}

fn clear_strata_env() {
    let keys: Vec<String> = env::vars()
        .map(|(key, _)| key)
        .filter(|key| key.starts_with("STRATA_"))
        .collect();
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for key in keys {
        unsafe { env::remove_var(key) };
    }
}

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
    assert_eq!(config.key_prefix, "");
    assert_eq!(config.lock_mode, LockMode::PerKey);
    assert_eq!(config.lock_timeout, Some(Duration::from_secs(5)));
    assert_eq!(config.maintenance_interval, Duration::from_secs(15 * 60));
    assert_eq!(config.policy.namespaces(), vec!["user", "userList"]);
    assert!(config.validate().is_ok());
}

#[test]
fn test_namespace_var_names() {
    assert_eq!(
        Config::namespace_var("userList", "DISTRIBUTED_TTL_SECS"),
        "STRATA_NS_USERLIST_DISTRIBUTED_TTL_SECS"
    );
    assert_eq!(
        Config::namespace_var("order-items", "MAX_LOCAL_ENTRIES"),
        "STRATA_NS_ORDER_ITEMS_MAX_LOCAL_ENTRIES"
    );
}

#[test]
#[serial]
fn test_from_env_with_defaults() {
    clear_strata_env();

    let config = Config::from_env().expect("should parse with defaults");

    assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
    assert_eq!(config.policy, PolicyTable::default());
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_from_env_connection_and_locks() {
    clear_strata_env();

    with_env_vars(
        &[
            ("STRATA_REDIS_URL", "redis://cache.internal:6380/2"),
            ("STRATA_KEY_PREFIX", "app:"),
            ("STRATA_LOCK_MODE", "global"),
            ("STRATA_LOCK_TIMEOUT_MS", "250"),
            ("STRATA_MAINTENANCE_INTERVAL_SECS", "60"),
        ],
        || {
            let config = Config::from_env().expect("should parse");

            assert_eq!(config.redis_url, "redis://cache.internal:6380/2");
            assert_eq!(config.key_prefix, "app:");
            assert_eq!(config.policy.key_prefix(), "app:");
            assert_eq!(config.lock_mode, LockMode::Global);
            assert_eq!(config.lock_timeout, Some(Duration::from_millis(250)));
            assert_eq!(config.maintenance_interval, Duration::from_secs(60));

            let locks = config.key_locks();
            assert_eq!(locks.mode(), LockMode::Global);
            assert_eq!(locks.timeout(), Some(Duration::from_millis(250)));
        },
    );
}

#[test]
#[serial]
fn test_zero_lock_timeout_waits_indefinitely() {
    clear_strata_env();

    with_env_vars(&[("STRATA_LOCK_TIMEOUT_MS", "0")], || {
        let config = Config::from_env().expect("should parse");
        assert_eq!(config.lock_timeout, None);
    });
}

#[test]
#[serial]
fn test_invalid_lock_mode() {
    clear_strata_env();

    with_env_vars(&[("STRATA_LOCK_MODE", "striped")], || {
        let err = Config::from_env().expect_err("should fail");
        assert!(matches!(err, ConfigError::InvalidLockMode { .. }));
        assert!(err.to_string().contains("striped"));
    });
}

#[test]
#[serial]
fn test_invalid_number() {
    clear_strata_env();

    with_env_vars(&[("STRATA_NS_USER_NEGATIVE_TTL_SECS", "five")], || {
        let err = Config::from_env().expect_err("should fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref name, .. } if name == "STRATA_NS_USER_NEGATIVE_TTL_SECS"
        ));
    });
}

#[test]
#[serial]
fn test_namespace_overrides() {
    clear_strata_env();

    with_env_vars(
        &[
            ("STRATA_NAMESPACES", "orders, catalog"),
            ("STRATA_NS_ORDERS_DISTRIBUTED_TTL_SECS", "120"),
            ("STRATA_NS_ORDERS_NEGATIVE_TTL_SECS", "30"),
            ("STRATA_NS_ORDERS_MAX_LOCAL_ENTRIES", "50"),
            ("STRATA_NS_ORDERS_INITIAL_LOCAL_CAPACITY", "10"),
            ("STRATA_NS_ORDERS_LOCAL_REFRESH_SECS", "0"),
            ("STRATA_NS_USERLIST_DISTRIBUTED_TTL_SECS", "900"),
        ],
        || {
            let config = Config::from_env().expect("should parse");
            assert!(config.validate().is_ok());

            let table = config.policy_table();
            assert_eq!(table.namespaces(), vec!["catalog", "orders", "user", "userList"]);

            let orders = table.policy("orders");
            assert_eq!(orders.distributed_ttl, Duration::from_secs(120));
            assert_eq!(orders.negative_ttl, Duration::from_secs(30));
            assert_eq!(orders.max_local_entries, 50);
            assert_eq!(orders.initial_local_capacity, 10);
            assert_eq!(orders.local_refresh_interval, None);

            assert_eq!(table.policy("catalog"), table.default_policy());
            assert_eq!(
                table.policy("userList").distributed_ttl,
                Duration::from_secs(900)
            );
            assert_eq!(
                table.policy("user").distributed_ttl,
                Duration::from_secs(1800)
            );
        },
    );
}

#[test]
#[serial]
fn test_validate_rejects_negative_ttl_not_shorter() {
    clear_strata_env();

    with_env_vars(&[("STRATA_NS_USER_NEGATIVE_TTL_SECS", "3600")], || {
        let config = Config::from_env().expect("should parse");
        let err = config.validate().expect_err("should fail");
        assert!(matches!(
            err,
            ConfigError::Policy(PolicyError::NegativeTtlNotShorter { .. })
        ));
    });
}

#[test]
#[serial]
fn test_validate_rejects_ttl_above_maximum() {
    clear_strata_env();

    // 2000 years.
    with_env_vars(
        &[("STRATA_NS_USER_LOCAL_WRITE_TTL_SECS", "63072000000")],
        || {
            let config = Config::from_env().expect("should parse");
            let err = config.validate().expect_err("should fail");
            assert!(matches!(
                err,
                ConfigError::Policy(PolicyError::TtlTooLong {
                    field: "local_write_ttl",
                    ..
                })
            ));
            assert!(err.to_string().contains("user"));
        },
    );
}

#[test]
#[serial]
fn test_validate_rejects_bad_namespace_and_prefix() {
    clear_strata_env();

    with_env_vars(&[("STRATA_NAMESPACES", "bad*name")], || {
        let config = Config::from_env().expect("should parse");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Policy(PolicyError::InvalidNamespace { .. }))
        ));
    });

    with_env_vars(&[("STRATA_KEY_PREFIX", "app*")], || {
        let config = Config::from_env().expect("should parse");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Policy(PolicyError::InvalidPrefix { .. }))
        ));
    });
}

#[test]
fn test_validate_rejects_zero_maintenance_interval() {
    let config = Config {
        maintenance_interval: Duration::ZERO,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidValue { .. })
    ));
}
