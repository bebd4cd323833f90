use crate::cache::CacheStats;

/// Result of one maintenance pass over a namespace.
#[derive(Debug, Clone)]
pub struct NamespaceSweep {
    pub namespace: String,
    pub purged_negative: usize,
    pub stats: CacheStats,
}

#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub namespaces: Vec<NamespaceSweep>,
    /// `(namespace, error)` for every namespace whose sweep failed.
    pub failures: Vec<(String, String)>,
}

impl SweepReport {
    pub fn total_purged(&self) -> usize {
        self.namespaces.iter().map(|n| n.purged_negative).sum()
    }

    #[inline]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
