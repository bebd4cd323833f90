//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `STRATA_*` environment variables;
//! per-namespace policy knobs use `STRATA_NS_<NAME>_<KNOB>`, where `<NAME>` is the
//! namespace upper-cased (`userList` → `USERLIST`).

pub mod error;

#[cfg(test)]
mod tests;

pub use error::ConfigError;

use std::env;
use std::time::Duration;

use crate::cache::{KeyLocks, LockMode, NamespacePolicy, PolicyTable};
use crate::constants::{
    DEFAULT_LOCK_TIMEOUT, DEFAULT_MAINTENANCE_INTERVAL, DEFAULT_REDIS_URL, USER_LIST_NAMESPACE,
    USER_NAMESPACE,
};

/// Cache configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `STRATA_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis endpoint for the distributed tier. Default: `redis://127.0.0.1:6379`.
    pub redis_url: String,

    /// Prepended to every distributed key. Default: empty.
    pub key_prefix: String,

    /// Load-lock granularity. Default: per key.
    pub lock_mode: LockMode,

    /// Longest wait for a load lock; `None` waits indefinitely. Default: 5s.
    pub lock_timeout: Option<Duration>,

    /// Interval between maintenance sweeps. Default: 15m.
    pub maintenance_interval: Duration,

    /// Namespace policies, built-ins plus `STRATA_NAMESPACES`.
    pub policy: PolicyTable,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            key_prefix: String::new(),
            lock_mode: LockMode::PerKey,
            lock_timeout: Some(DEFAULT_LOCK_TIMEOUT),
            maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL,
            policy: PolicyTable::default(),
        }
    }
}

impl Config {
    const ENV_REDIS_URL: &'static str = "STRATA_REDIS_URL";
    const ENV_KEY_PREFIX: &'static str = "STRATA_KEY_PREFIX";
    const ENV_LOCK_MODE: &'static str = "STRATA_LOCK_MODE";
    const ENV_LOCK_TIMEOUT_MS: &'static str = "STRATA_LOCK_TIMEOUT_MS";
    const ENV_NAMESPACES: &'static str = "STRATA_NAMESPACES";
    const ENV_MAINTENANCE_INTERVAL_SECS: &'static str = "STRATA_MAINTENANCE_INTERVAL_SECS";
    const ENV_NAMESPACE_PREFIX: &'static str = "STRATA_NS_";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let redis_url = Self::parse_string_from_env(Self::ENV_REDIS_URL, defaults.redis_url);
        let key_prefix = Self::parse_string_from_env(Self::ENV_KEY_PREFIX, defaults.key_prefix);
        let lock_mode = Self::parse_lock_mode_from_env(defaults.lock_mode)?;
        let lock_timeout = Self::parse_lock_timeout_from_env(defaults.lock_timeout)?;
        let maintenance_interval = Self::parse_secs_from_env(
            Self::ENV_MAINTENANCE_INTERVAL_SECS,
            defaults.maintenance_interval,
        )?;

        let mut policy = defaults.policy.with_key_prefix(&key_prefix);
        let mut namespaces = vec![USER_NAMESPACE.to_string(), USER_LIST_NAMESPACE.to_string()];
        namespaces.extend(Self::parse_list_from_env(Self::ENV_NAMESPACES));
        for namespace in namespaces {
            let base = policy.policy(&namespace).clone();
            let resolved = Self::parse_namespace_policy_from_env(&namespace, base)?;
            policy.set_namespace(&namespace, resolved);
        }

        Ok(Self {
            redis_url,
            key_prefix,
            lock_mode,
            lock_timeout,
            maintenance_interval,
            policy,
        })
    }

    /// Checks the prefix and every namespace policy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.maintenance_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: Self::ENV_MAINTENANCE_INTERVAL_SECS.to_string(),
                value: "0".to_string(),
                reason: "interval must be positive".to_string(),
            });
        }
        self.policy.validate()?;
        Ok(())
    }

    /// The one policy table shared by both tiers and both access paths.
    pub fn policy_table(&self) -> PolicyTable {
        self.policy.clone()
    }

    pub fn key_locks(&self) -> KeyLocks {
        KeyLocks::new(self.lock_mode, self.lock_timeout)
    }

    /// Environment variable holding `knob` for `namespace`.
    pub fn namespace_var(namespace: &str, knob: &str) -> String {
        let name: String = namespace
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}{name}_{knob}", Self::ENV_NAMESPACE_PREFIX)
    }

    fn parse_namespace_policy_from_env(
        namespace: &str,
        base: NamespacePolicy,
    ) -> Result<NamespacePolicy, ConfigError> {
        let var = |knob: &str| Self::namespace_var(namespace, knob);

        let refresh_var = var("LOCAL_REFRESH_SECS");
        let local_refresh_interval = match Self::parse_u64_opt_from_env(&refresh_var)? {
            // Zero turns refresh-ahead off.
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => base.local_refresh_interval,
        };

        Ok(base
            .clone()
            .local_write_ttl(Self::parse_secs_from_env(
                &var("LOCAL_WRITE_TTL_SECS"),
                base.local_write_ttl,
            )?)
            .local_access_ttl(Self::parse_secs_from_env(
                &var("LOCAL_ACCESS_TTL_SECS"),
                base.local_access_ttl,
            )?)
            .local_refresh_interval(local_refresh_interval)
            .distributed_ttl(Self::parse_secs_from_env(
                &var("DISTRIBUTED_TTL_SECS"),
                base.distributed_ttl,
            )?)
            .negative_ttl(Self::parse_secs_from_env(
                &var("NEGATIVE_TTL_SECS"),
                base.negative_ttl,
            )?)
            .max_local_entries(
                Self::parse_u64_opt_from_env(&var("MAX_LOCAL_ENTRIES"))?
                    .unwrap_or(base.max_local_entries),
            )
            .initial_local_capacity(
                Self::parse_u64_opt_from_env(&var("INITIAL_LOCAL_CAPACITY"))?
                    .map(|n| n as usize)
                    .unwrap_or(base.initial_local_capacity),
            ))
    }

    fn parse_lock_mode_from_env(default: LockMode) -> Result<LockMode, ConfigError> {
        match env::var(Self::ENV_LOCK_MODE) {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidLockMode { value }),
            Err(_) => Ok(default),
        }
    }

    fn parse_lock_timeout_from_env(
        default: Option<Duration>,
    ) -> Result<Option<Duration>, ConfigError> {
        match Self::parse_u64_opt_from_env(Self::ENV_LOCK_TIMEOUT_MS)? {
            Some(0) => Ok(None),
            Some(ms) => Ok(Some(Duration::from_millis(ms))),
            None => Ok(default),
        }
    }

    fn parse_secs_from_env(var_name: &str, default: Duration) -> Result<Duration, ConfigError> {
        Ok(Self::parse_u64_opt_from_env(var_name)?
            .map(Duration::from_secs)
            .unwrap_or(default))
    }

    fn parse_u64_opt_from_env(var_name: &str) -> Result<Option<u64>, ConfigError> {
        match env::var(var_name) {
            Ok(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                    name: var_name.to_string(),
                    value,
                    reason: e.to_string(),
                }),
            Err(_) => Ok(None),
        }
    }

    fn parse_list_from_env(var_name: &str) -> Vec<String> {
        env::var(var_name)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }
}
