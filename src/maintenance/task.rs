use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time;
use tracing::{info, warn};

use super::types::{NamespaceSweep, SweepReport};
use crate::cache::{CacheTiers, DistributedCache};

/// Background sweeper: purges negative markers of every configured namespace
/// and logs per-namespace counters, once per interval.
pub struct MaintenanceTask<D: DistributedCache> {
    tiers: CacheTiers<D>,
    interval: Duration,
    namespaces: Vec<String>,
    shutdown_initiated: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl<D: DistributedCache> MaintenanceTask<D> {
    /// Sweeps every namespace configured in the tiers' policy table.
    pub fn new(tiers: CacheTiers<D>, interval: Duration) -> Self {
        let namespaces = tiers.policy().namespaces();
        Self {
            tiers,
            interval,
            namespaces,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn with_namespaces(mut self, namespaces: Vec<String>) -> Self {
        self.namespaces = namespaces;
        self
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[inline]
    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// One sweep. Failures are recorded per namespace; the pass always completes.
    pub async fn run_once(&self) -> SweepReport {
        sweep(&self.tiers, &self.namespaces).await
    }

    /// Starts the sweep loop (no-op if already running). The first sweep runs
    /// immediately.
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        // AcqRel: only one loop may observe `false` here.
        if self.running.swap(true, Ordering::AcqRel) {
            return tokio::spawn(async {});
        }
        self.shutdown_initiated.store(false, Ordering::Release);

        let tiers = self.tiers.clone();
        let namespaces = self.namespaces.clone();
        let every = self.interval;
        let shutdown_initiated = Arc::clone(&self.shutdown_initiated);
        let running = Arc::clone(&self.running);
        let wake = Arc::clone(&self.wake);

        tokio::spawn(async move {
            let mut interval = time::interval(every);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = wake.notified() => {}
                }
                if shutdown_initiated.load(Ordering::Acquire) {
                    break;
                }
                sweep(&tiers, &namespaces).await;
            }
            running.store(false, Ordering::Release);
            info!("Maintenance loop stopped");
        })
    }

    /// Stops the loop after any in-progress sweep (idempotent).
    pub fn shutdown(&self) {
        if self.shutdown_initiated.swap(true, Ordering::AcqRel) {
            return;
        }
        self.wake.notify_one();
    }
}

impl<D: DistributedCache> std::fmt::Debug for MaintenanceTask<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceTask")
            .field("interval", &self.interval)
            .field("namespaces", &self.namespaces)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

async fn sweep<D: DistributedCache>(tiers: &CacheTiers<D>, namespaces: &[String]) -> SweepReport {
    let mut report = SweepReport::default();
    for namespace in namespaces {
        match tiers.purge_negative(namespace).await {
            Ok(purged_negative) => {
                let stats = tiers.stats(namespace);
                info!(
                    namespace = %namespace,
                    purged_negative,
                    l1_hits = stats.l1_hits,
                    l2_hits = stats.l2_hits,
                    negative_hits = stats.negative_hits,
                    origin_loads = stats.origin_loads,
                    degraded_reads = stats.degraded_reads,
                    hit_rate = stats.hit_rate(),
                    "Namespace swept"
                );
                report.namespaces.push(NamespaceSweep {
                    namespace: namespace.clone(),
                    purged_negative,
                    stats,
                });
            }
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Namespace sweep failed");
                report.failures.push((namespace.clone(), e.to_string()));
            }
        }
    }
    report
}
