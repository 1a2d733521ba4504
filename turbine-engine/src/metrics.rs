//! Engine-wide monotonic counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Mutable counter bag updated from every engine component
///
/// All counters are monotonic except `active_temporary_workers`, which is a
/// gauge tracking currently-live overflow workers.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    tasks_executed: AtomicU64,
    tasks_failed: AtomicU64,
    retries: AtomicU64,
    affinity_hits: AtomicU64,
    affinity_misses: AtomicU64,
    temporary_workers_created: AtomicU64,
    active_temporary_workers: AtomicU64,
    coalesced: AtomicU64,
    unique: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_task_executed(&self) {
        self.tasks_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_affinity_hit(&self) {
        self.affinity_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_affinity_miss(&self) {
        self.affinity_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_temporary_created(&self) {
        self.temporary_workers_created.fetch_add(1, Ordering::Relaxed);
        self.active_temporary_workers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_temporary_released(&self) {
        self.active_temporary_workers.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unique(&self) {
        self.unique.fetch_add(1, Ordering::Relaxed);
    }

    /// Take an immutable snapshot of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_executed: self.tasks_executed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            affinity_hits: self.affinity_hits.load(Ordering::Relaxed),
            affinity_misses: self.affinity_misses.load(Ordering::Relaxed),
            temporary_workers_created: self.temporary_workers_created.load(Ordering::Relaxed),
            active_temporary_workers: self.active_temporary_workers.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            unique: self.unique.load(Ordering::Relaxed),
        }
    }
}

/// Frozen view of the counter bag at one observation point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub tasks_executed: u64,
    pub tasks_failed: u64,
    pub retries: u64,
    pub affinity_hits: u64,
    pub affinity_misses: u64,
    pub temporary_workers_created: u64,
    pub active_temporary_workers: u64,
    pub coalesced: u64,
    pub unique: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = EngineMetrics::new();
        metrics.record_task_executed();
        metrics.record_task_executed();
        metrics.record_task_failed();
        metrics.record_retry();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_executed, 2);
        assert_eq!(snapshot.tasks_failed, 1);
        assert_eq!(snapshot.retries, 1);
    }

    #[test]
    fn test_temporary_gauge() {
        let metrics = EngineMetrics::new();
        metrics.record_temporary_created();
        metrics.record_temporary_created();
        metrics.record_temporary_released();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.temporary_workers_created, 2);
        assert_eq!(snapshot.active_temporary_workers, 1);
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let metrics = EngineMetrics::new();
        let before = metrics.snapshot();
        metrics.record_coalesced();
        assert_eq!(before.coalesced, 0);
        assert_eq!(metrics.snapshot().coalesced, 1);
    }
}
