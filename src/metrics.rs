use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counters for the spawn and collection pipeline
#[derive(Debug, Default)]
pub struct LootMetrics {
    spawns_requested: AtomicU64,
    spawns_committed: AtomicU64,
    spawns_failed: AtomicU64,
    collections: AtomicU64,
    conflicts: AtomicU64,
    not_found: AtomicU64,
    merge_retries: AtomicU64,
    pending_merges: AtomicU64,
    last_collect_latency: RwLock<Option<Duration>>,
}

impl LootMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// The tracker asked for a spawn
    pub fn record_spawn_requested(&self) {
        self.spawns_requested.fetch_add(1, Ordering::Relaxed);
    }

    /// A spawned box reached the store
    pub fn record_spawn_committed(&self) {
        self.spawns_committed.fetch_add(1, Ordering::Relaxed);
    }

    /// A spawn write failed and was dropped
    pub fn record_spawn_failed(&self) {
        self.spawns_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A claim succeeded; `latency` covers claim plus merge
    pub fn record_collection(&self, latency: Duration) {
        self.collections.fetch_add(1, Ordering::Relaxed);
        *self.last_collect_latency.write() = Some(latency);
    }

    /// A claim lost the race
    pub fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    /// An inventory merge attempt failed transiently and will be retried
    pub fn record_merge_retry(&self) {
        self.merge_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// A merge was abandoned and left for recovery
    pub fn record_pending_merge(&self) {
        self.pending_merges.fetch_add(1, Ordering::Relaxed);
    }

    pub fn spawns_requested(&self) -> u64 {
        self.spawns_requested.load(Ordering::Relaxed)
    }

    pub fn spawns_committed(&self) -> u64 {
        self.spawns_committed.load(Ordering::Relaxed)
    }

    pub fn spawns_failed(&self) -> u64 {
        self.spawns_failed.load(Ordering::Relaxed)
    }

    pub fn collections(&self) -> u64 {
        self.collections.load(Ordering::Relaxed)
    }

    pub fn conflicts(&self) -> u64 {
        self.conflicts.load(Ordering::Relaxed)
    }

    pub fn not_found(&self) -> u64 {
        self.not_found.load(Ordering::Relaxed)
    }

    pub fn merge_retries(&self) -> u64 {
        self.merge_retries.load(Ordering::Relaxed)
    }

    pub fn pending_merges(&self) -> u64 {
        self.pending_merges.load(Ordering::Relaxed)
    }

    pub fn last_collect_latency(&self) -> Option<Duration> {
        *self.last_collect_latency.read()
    }

    /// Share of claims that won, as a percentage
    pub fn collection_success_rate(&self) -> f32 {
        let won = self.collections() as f32;
        let lost = self.conflicts() as f32;

        if won + lost > 0.0 {
            won / (won + lost) * 100.0
        } else {
            0.0
        }
    }
}

/// Cloneable shared handle to [`LootMetrics`]
#[derive(Debug, Clone, Default)]
pub struct LootMetricsHandle(Arc<LootMetrics>);

impl LootMetricsHandle {
    pub fn new() -> Self {
        Self(Arc::new(LootMetrics::new()))
    }

    pub fn inner(&self) -> &LootMetrics {
        &self.0
    }
}

impl std::ops::Deref for LootMetricsHandle {
    type Target = LootMetrics;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_shared_between_handles() {
        let metrics = LootMetricsHandle::new();
        let clone = metrics.clone();

        clone.record_spawn_requested();
        clone.record_spawn_committed();
        clone.record_conflict();

        assert_eq!(metrics.spawns_requested(), 1);
        assert_eq!(metrics.spawns_committed(), 1);
        assert_eq!(metrics.conflicts(), 1);
    }

    #[test]
    fn test_success_rate() {
        let metrics = LootMetrics::new();
        assert_eq!(metrics.collection_success_rate(), 0.0);

        metrics.record_collection(Duration::from_millis(12));
        metrics.record_collection(Duration::from_millis(8));
        metrics.record_collection(Duration::from_millis(9));
        metrics.record_conflict();

        assert_eq!(metrics.collection_success_rate(), 75.0);
        assert_eq!(metrics.last_collect_latency(), Some(Duration::from_millis(9)));
    }
}
