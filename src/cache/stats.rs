use std::sync::atomic::{AtomicU64, Ordering};

use super::l1::LocalCacheStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Counter {
    L1Hit,
    L2Hit,
    NegativeHit,
    OriginLoad,
    OriginMiss,
    OriginError,
    DegradedRead,
    LockTimeout,
    Refresh,
}

/// Read-path counters for one namespace, shared by both access paths.
#[derive(Debug, Default)]
pub struct NamespaceStats {
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    negative_hits: AtomicU64,
    origin_loads: AtomicU64,
    origin_misses: AtomicU64,
    origin_errors: AtomicU64,
    degraded_reads: AtomicU64,
    lock_timeouts: AtomicU64,
    refreshes: AtomicU64,
}

impl NamespaceStats {
    pub(crate) fn incr(&self, counter: Counter) {
        let slot = match counter {
            Counter::L1Hit => &self.l1_hits,
            Counter::L2Hit => &self.l2_hits,
            Counter::NegativeHit => &self.negative_hits,
            Counter::OriginLoad => &self.origin_loads,
            Counter::OriginMiss => &self.origin_misses,
            Counter::OriginError => &self.origin_errors,
            Counter::DegradedRead => &self.degraded_reads,
            Counter::LockTimeout => &self.lock_timeouts,
            Counter::Refresh => &self.refreshes,
        };
        slot.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, namespace: &str, local: LocalCacheStats) -> CacheStats {
        CacheStats {
            namespace: namespace.to_string(),
            l1_hits: self.l1_hits.load(Ordering::Relaxed),
            l2_hits: self.l2_hits.load(Ordering::Relaxed),
            negative_hits: self.negative_hits.load(Ordering::Relaxed),
            origin_loads: self.origin_loads.load(Ordering::Relaxed),
            origin_misses: self.origin_misses.load(Ordering::Relaxed),
            origin_errors: self.origin_errors.load(Ordering::Relaxed),
            degraded_reads: self.degraded_reads.load(Ordering::Relaxed),
            lock_timeouts: self.lock_timeouts.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            local,
        }
    }
}

/// Snapshot of a namespace's counters.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub namespace: String,
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub negative_hits: u64,
    /// Origin calls made (including uncached bypass loads).
    pub origin_loads: u64,
    /// Origin calls that confirmed absence.
    pub origin_misses: u64,
    pub origin_errors: u64,
    pub degraded_reads: u64,
    pub lock_timeouts: u64,
    pub refreshes: u64,
    pub local: LocalCacheStats,
}

impl CacheStats {
    /// Share of reads answered by a tier (positive or negative).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.l1_hits + self.l2_hits + self.negative_hits;
        let total = hits + self.origin_loads;
        if total == 0 {
            return 0.0;
        }
        hits as f64 / total as f64
    }
}
