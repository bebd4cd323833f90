//! Strata ops entrypoint: inspect and repair the distributed tier.

use std::time::Duration;

use anyhow::{Context, bail};
use tokio::signal;

use strata::cache::{CacheTiers, DeclarativeCacheManager, RedisDistributedCache};
use strata::config::Config;
use strata::maintenance::MaintenanceTask;

const USAGE: &str = "\
usage: strata <command>

commands:
  health                   ping the distributed tier
  keys <namespace>         list distributed keys of a namespace
  invalidate <ns> <id>     evict one entry (and its negative marker)
  purge-negative <ns>      delete every negative marker of a namespace
  clear <ns>               delete every entry of a namespace
  maintain                 run periodic negative-marker sweeps until Ctrl+C

flags:
  --health-check           exit 0 if the distributed tier answers PING, 1 otherwise";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check().await);
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{USAGE}");
        return Ok(());
    };

    let config = Config::from_env()?;
    config.validate()?;

    let backend = RedisDistributedCache::connect(&config.redis_url)
        .await
        .with_context(|| format!("connecting to {}", config.redis_url))?;
    let tiers = CacheTiers::new(config.policy_table(), backend, config.key_locks())?;
    let manager = DeclarativeCacheManager::new(tiers.clone());

    match (command.as_str(), &args[1..]) {
        ("health", []) => {
            tiers.backend().ping().await?;
            println!("ok");
        }
        ("keys", [namespace]) => {
            let pattern = tiers.policy().namespace_pattern(namespace);
            for key in tiers.distributed().keys(&pattern).await? {
                println!("{key}");
            }
        }
        ("invalidate", [namespace, id]) => {
            manager.cache(namespace)?.evict(id).await?;
            println!("invalidated {namespace}:{id}");
        }
        ("purge-negative", [namespace]) => {
            let report = MaintenanceTask::new(tiers.clone(), config.maintenance_interval)
                .with_namespaces(vec![namespace.clone()])
                .run_once()
                .await;
            if let Some((_, error)) = report.failures.first() {
                bail!("purge of '{namespace}' failed: {error}");
            }
            println!("purged {} negative markers", report.total_purged());
        }
        ("clear", [namespace]) => {
            let removed = manager.cache(namespace)?.clear().await?;
            println!("removed {removed} keys");
        }
        ("maintain", []) => {
            tracing::info!(
                interval_secs = config.maintenance_interval.as_secs(),
                namespaces = ?tiers.policy().namespaces(),
                "Strata maintenance starting"
            );
            let task = MaintenanceTask::new(tiers.clone(), config.maintenance_interval);
            let handle = task.start();
            shutdown_signal().await;
            task.shutdown();
            handle.await?;
            tracing::info!("Strata maintenance shutdown complete");
        }
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}

async fn run_health_check() -> i32 {
    let url = std::env::var("STRATA_REDIS_URL")
        .unwrap_or_else(|_| strata::constants::DEFAULT_REDIS_URL.to_string());

    let ping = async {
        let backend = RedisDistributedCache::connect(&url).await?;
        backend.ping().await
    };
    match tokio::time::timeout(Duration::from_secs(1), ping).await {
        Ok(Ok(())) => 0,
        _ => 1,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
