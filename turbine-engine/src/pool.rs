//! Worker pool manager
//!
//! Owns worker lifecycle for the normal and generator pools: selection with
//! affinity routing, growth, temporary overflow, priority queueing, release
//! hand-off, and idle reclamation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::AbortHandle;
use tracing::{debug, info};
use turbine_config::PoolConfig;

use crate::descriptor::{PoolType, Priority};
use crate::error::{TaskError, TaskResult};
use crate::metrics::EngineMetrics;
use crate::queue::{QueuedTask, WaitQueue};
use crate::worker::{WorkerHandle, WorkerSpawner};

/// Affinity sets reset wholesale at this size; retention is best-effort
const AFFINITY_CAP: usize = 50;

/// A granted worker
///
/// `entry_id` is absent exactly when the worker is a temporary overflow
/// worker, which never joins the pool.
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub entry_id: Option<u64>,
    pub worker: WorkerHandle,
    pub temporary: bool,
    pub affinity_hit: bool,
}

/// Everything `release` needs to settle a worker's bookkeeping
#[derive(Debug)]
pub struct Release {
    pub entry_id: Option<u64>,
    pub worker: WorkerHandle,
    pub temporary: bool,
    pub execution_time: Duration,
    pub failed: bool,
    pub fingerprint: Option<u64>,
    /// The worker was hard-stopped; evict instead of returning to the pool
    pub force_terminated: bool,
}

/// A long-lived pooled worker
struct WorkerEntry {
    id: u64,
    worker: WorkerHandle,
    busy: bool,
    tasks_executed: u64,
    tasks_failed: u64,
    exec_time: Duration,
    /// Fingerprints of callables previously run here
    affinity: HashSet<u64>,
    idle_timer: Option<AbortHandle>,
    started_at: DateTime<Utc>,
}

impl WorkerEntry {
    fn new(id: u64, worker: WorkerHandle, busy: bool) -> Self {
        Self {
            id,
            worker,
            busy,
            tasks_executed: 0,
            tasks_failed: 0,
            exec_time: Duration::ZERO,
            affinity: HashSet::new(),
            idle_timer: None,
            started_at: Utc::now(),
        }
    }
}

/// Mutable state of one pool, guarded as a unit
struct PoolState {
    entries: Vec<WorkerEntry>,
    busy_count: usize,
    idle_count: usize,
    queue: WaitQueue,
    next_entry_id: u64,
}

impl PoolState {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            busy_count: 0,
            idle_count: 0,
            queue: WaitQueue::new(),
            next_entry_id: 0,
        }
    }
}

struct PoolShared {
    config: PoolConfig,
    spawner: Arc<dyn WorkerSpawner>,
    metrics: Arc<EngineMetrics>,
    normal: Mutex<PoolState>,
    generator: Mutex<PoolState>,
    temp_active: AtomicUsize,
    shutting_down: AtomicBool,
}

/// Handle to the shared pool state
#[derive(Clone)]
pub struct PoolManager {
    shared: Arc<PoolShared>,
}

impl PoolManager {
    pub fn new(
        config: PoolConfig,
        spawner: Arc<dyn WorkerSpawner>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                config,
                spawner,
                metrics,
                normal: Mutex::new(PoolState::new()),
                generator: Mutex::new(PoolState::new()),
                temp_active: AtomicUsize::new(0),
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    fn state(&self, pool_type: PoolType) -> &Mutex<PoolState> {
        match pool_type {
            PoolType::Normal => &self.shared.normal,
            PoolType::Generator => &self.shared.generator,
        }
    }

    /// Select a worker, growing or queueing as needed
    ///
    /// Strategies are tried strictly in order: affinity match, least-used
    /// idle, pool growth, temporary overflow, queue. A queued acquisition
    /// suspends until a release hands a worker over.
    pub async fn acquire(
        &self,
        pool_type: PoolType,
        priority: Priority,
        fingerprint: Option<u64>,
    ) -> TaskResult<Acquisition> {
        if self.shared.shutting_down.load(Ordering::SeqCst) {
            return Err(TaskError::Aborted {
                reason: Some("engine shut down".to_string()),
            });
        }

        let waiter = {
            let mut guard = self.state(pool_type).lock().await;
            let state = &mut *guard;

            // 1. Affinity match on an idle worker.
            if let Some(fp) = fingerprint {
                let hit = if state.idle_count > 0 {
                    state
                        .entries
                        .iter()
                        .position(|e| !e.busy && e.affinity.contains(&fp))
                } else {
                    None
                };
                match hit {
                    Some(idx) => {
                        self.shared.metrics.record_affinity_hit();
                        return Ok(claim_entry(state, idx, true));
                    }
                    None => self.shared.metrics.record_affinity_miss(),
                }
            }

            // 2. Least-used idle worker; a never-used one wins outright.
            if state.idle_count > 0 {
                let mut best: Option<(usize, u64)> = None;
                for (idx, entry) in state.entries.iter().enumerate() {
                    if entry.busy {
                        continue;
                    }
                    if entry.tasks_executed == 0 {
                        best = Some((idx, 0));
                        break;
                    }
                    match best {
                        Some((_, count)) if entry.tasks_executed >= count => {}
                        _ => best = Some((idx, entry.tasks_executed)),
                    }
                }
                if let Some((idx, _)) = best {
                    return Ok(claim_entry(state, idx, false));
                }
            }

            // 3. Grow the pool. The entry is born busy so a concurrent
            // acquirer can never claim it between push and return.
            if state.entries.len() < self.shared.config.pool_size {
                let worker = self.shared.spawner.spawn(pool_type)?;
                let id = state.next_entry_id;
                state.next_entry_id += 1;
                state.entries.push(WorkerEntry::new(id, worker.clone(), true));
                state.busy_count += 1;
                self.monitor_exit(pool_type, id, worker.clone());
                debug!(pool = pool_type.as_str(), entry_id = id, "pool grew");
                return Ok(Acquisition {
                    entry_id: Some(id),
                    worker,
                    temporary: false,
                    affinity_hit: false,
                });
            }

            // 4. Temporary overflow worker, terminated on release.
            if self.shared.temp_active.load(Ordering::SeqCst)
                < self.shared.config.max_temporary_workers
            {
                let worker = self.shared.spawner.spawn(pool_type)?;
                self.shared.temp_active.fetch_add(1, Ordering::SeqCst);
                self.shared.metrics.record_temporary_created();
                debug!(pool = pool_type.as_str(), "created temporary worker");
                return Ok(Acquisition {
                    entry_id: None,
                    worker,
                    temporary: true,
                    affinity_hit: false,
                });
            }

            // 5. Queue, or fail when the band queues are at capacity.
            if state.queue.len() < self.shared.config.max_queue_size {
                let (tx, rx) = oneshot::channel();
                state.queue.enqueue(QueuedTask { resolver: tx }, priority);
                rx
            } else {
                return Err(TaskError::QueueFull {
                    max_size: self.shared.config.max_queue_size,
                });
            }
        };

        waiter.await.map_err(|_| TaskError::Aborted {
            reason: Some("pool shut down".to_string()),
        })
    }

    /// Return a worker after a task settles
    pub async fn release(&self, pool_type: PoolType, release: Release) {
        if release.temporary {
            self.shared.temp_active.fetch_sub(1, Ordering::SeqCst);
            self.shared.metrics.record_temporary_released();
            if !release.force_terminated {
                release.worker.terminate();
            }
            return;
        }

        let Some(entry_id) = release.entry_id else {
            return;
        };

        let mut guard = self.state(pool_type).lock().await;
        let state = &mut *guard;
        let Some(idx) = state.entries.iter().position(|e| e.id == entry_id) else {
            // The worker exited underneath us and was already removed.
            return;
        };

        {
            let entry = &mut state.entries[idx];
            entry.tasks_executed += 1;
            entry.exec_time += release.execution_time;
            if release.failed {
                entry.tasks_failed += 1;
            }
        }

        if release.force_terminated {
            let entry = state.entries.remove(idx);
            if entry.busy {
                state.busy_count -= 1;
            } else {
                state.idle_count -= 1;
            }
            if let Some(timer) = entry.idle_timer {
                timer.abort();
            }
            drop(guard);
            entry.worker.terminate();
            debug!(entry_id, "evicted force-terminated worker");
            return;
        }

        if let Some(fp) = release.fingerprint {
            if !self.shared.config.low_memory_mode {
                let entry = &mut state.entries[idx];
                if entry.affinity.len() >= AFFINITY_CAP {
                    entry.affinity.clear();
                }
                entry.affinity.insert(fp);
            }
        }

        // Hand off directly to the highest-priority waiter. The busy flag
        // stays set: the worker continues execution under the next task, so
        // there is never an idle window a concurrent acquirer could claim.
        if state.entries[idx].busy {
            while let Some(task) = state.queue.dequeue_highest() {
                let handoff = Acquisition {
                    entry_id: Some(entry_id),
                    worker: state.entries[idx].worker.clone(),
                    temporary: false,
                    affinity_hit: false,
                };
                if task.resolver.send(handoff).is_ok() {
                    return;
                }
                // Waiter abandoned its acquisition; offer the next one.
            }
        }

        let entry = &mut state.entries[idx];
        if entry.busy {
            entry.busy = false;
            state.busy_count -= 1;
            state.idle_count += 1;
        }
        let timer = self.arm_idle_timer(pool_type, entry_id);
        if let Some(previous) = state.entries[idx].idle_timer.replace(timer) {
            previous.abort();
        }
    }

    /// Pre-spawn idle workers up to the pool cap
    pub async fn warmup(&self, pool_type: PoolType, count: usize) -> TaskResult<usize> {
        let mut guard = self.state(pool_type).lock().await;
        let state = &mut *guard;
        let mut created = 0;

        while created < count && state.entries.len() < self.shared.config.pool_size {
            let worker = self.shared.spawner.spawn(pool_type)?;
            let id = state.next_entry_id;
            state.next_entry_id += 1;
            let mut entry = WorkerEntry::new(id, worker.clone(), false);
            entry.idle_timer = Some(self.arm_idle_timer(pool_type, id));
            state.entries.push(entry);
            state.idle_count += 1;
            self.monitor_exit(pool_type, id, worker);
            created += 1;
        }

        if created > 0 {
            info!(pool = pool_type.as_str(), created, "warmed up workers");
        }
        Ok(created)
    }

    /// Snapshot one pool's occupancy and per-worker stats
    pub async fn stats(&self, pool_type: PoolType) -> PoolStats {
        let guard = self.state(pool_type).lock().await;
        PoolStats {
            pool_type,
            size: guard.entries.len(),
            busy_count: guard.busy_count,
            idle_count: guard.idle_count,
            queued: guard.queue.len(),
            temporary_active: self.shared.temp_active.load(Ordering::SeqCst),
            workers: guard
                .entries
                .iter()
                .map(|entry| WorkerStatsEntry {
                    id: entry.id,
                    worker_id: entry.worker.id().to_string(),
                    busy: entry.busy,
                    tasks_executed: entry.tasks_executed,
                    tasks_failed: entry.tasks_failed,
                    exec_time_ms: entry.exec_time.as_millis() as u64,
                    affinity_size: entry.affinity.len(),
                    started_at: entry.started_at,
                })
                .collect(),
        }
    }

    /// Whether `shutdown` has been called
    pub fn is_shut_down(&self) -> bool {
        self.shared.shutting_down.load(Ordering::SeqCst)
    }

    /// Terminate every pooled worker and drop every queued waiter
    pub async fn shutdown(&self) {
        self.shared.shutting_down.store(true, Ordering::SeqCst);

        for pool_type in [PoolType::Normal, PoolType::Generator] {
            let entries = {
                let mut guard = self.state(pool_type).lock().await;
                let state = &mut *guard;
                state.queue.clear();
                state.busy_count = 0;
                state.idle_count = 0;
                std::mem::take(&mut state.entries)
            };
            for entry in entries {
                if let Some(timer) = entry.idle_timer {
                    timer.abort();
                }
                entry.worker.terminate();
            }
        }
        info!("pool manager shut down");
    }

    /// Arm the idle-reclamation timer for an entry
    fn arm_idle_timer(&self, pool_type: PoolType, entry_id: u64) -> AbortHandle {
        let manager = self.clone();
        let idle_timeout = self.shared.config.worker_idle_timeout;
        let join = tokio::spawn(async move {
            tokio::time::sleep(idle_timeout).await;
            manager.reclaim_idle(pool_type, entry_id).await;
        });
        join.abort_handle()
    }

    /// Reclaim an entry that stayed idle past the timeout, keeping the
    /// configured floor alive
    async fn reclaim_idle(&self, pool_type: PoolType, entry_id: u64) {
        let mut guard = self.state(pool_type).lock().await;
        let state = &mut *guard;
        let Some(idx) = state.entries.iter().position(|e| e.id == entry_id) else {
            return;
        };

        let min_keep = self.shared.config.min_threads.max(1);
        if !state.entries[idx].busy && state.entries.len() > min_keep {
            let entry = state.entries.remove(idx);
            state.idle_count -= 1;
            drop(guard);
            debug!(entry_id, "reclaimed idle worker");
            entry.worker.terminate();
        } else {
            // Still needed; let it persist without a timer.
            state.entries[idx].idle_timer = None;
        }
    }

    /// Watch a pooled worker's exit channel and remove it on exit
    fn monitor_exit(&self, pool_type: PoolType, entry_id: u64, worker: WorkerHandle) {
        let manager = self.clone();
        tokio::spawn(async move {
            let code = worker.exited().await;
            manager.handle_worker_exit(pool_type, entry_id, code).await;
        });
    }

    async fn handle_worker_exit(&self, pool_type: PoolType, entry_id: u64, code: i32) {
        let mut guard = self.state(pool_type).lock().await;
        let state = &mut *guard;
        let Some(idx) = state.entries.iter().position(|e| e.id == entry_id) else {
            return;
        };
        let entry = state.entries.remove(idx);
        if entry.busy {
            state.busy_count -= 1;
        } else {
            state.idle_count -= 1;
        }
        if let Some(timer) = entry.idle_timer {
            timer.abort();
        }
        debug!(entry_id, code, "worker exited; removed from pool");
    }
}

fn claim_entry(state: &mut PoolState, idx: usize, affinity_hit: bool) -> Acquisition {
    let entry = &mut state.entries[idx];
    if let Some(timer) = entry.idle_timer.take() {
        timer.abort();
    }
    entry.busy = true;
    let acquisition = Acquisition {
        entry_id: Some(entry.id),
        worker: entry.worker.clone(),
        temporary: false,
        affinity_hit,
    };
    state.busy_count += 1;
    state.idle_count -= 1;
    acquisition
}

/// Per-worker observability snapshot
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatsEntry {
    pub id: u64,
    pub worker_id: String,
    pub busy: bool,
    pub tasks_executed: u64,
    pub tasks_failed: u64,
    pub exec_time_ms: u64,
    pub affinity_size: usize,
    pub started_at: DateTime<Utc>,
}

/// One pool's occupancy snapshot
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub pool_type: PoolType,
    pub size: usize,
    pub busy_count: usize,
    pub idle_count: usize,
    pub queued: usize,
    pub temporary_active: usize,
    pub workers: Vec<WorkerStatsEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CallableRegistry;
    use crate::worker::TaskWorkerSpawner;

    fn manager_with(config: PoolConfig) -> PoolManager {
        let registry = Arc::new(CallableRegistry::new());
        let spawner = Arc::new(TaskWorkerSpawner::new(registry, 16));
        PoolManager::new(config, spawner, Arc::new(EngineMetrics::new()))
    }

    fn small_config(pool_size: usize, max_temps: usize, max_queue: usize) -> PoolConfig {
        PoolConfig {
            pool_size,
            min_threads: 1,
            max_queue_size: max_queue,
            max_temporary_workers: max_temps,
            worker_idle_timeout: Duration::from_secs(60),
            ..Default::default()
        }
    }

    fn plain_release(acquisition: &Acquisition) -> Release {
        Release {
            entry_id: acquisition.entry_id,
            worker: acquisition.worker.clone(),
            temporary: acquisition.temporary,
            execution_time: Duration::from_millis(1),
            failed: false,
            fingerprint: None,
            force_terminated: false,
        }
    }

    #[tokio::test]
    async fn test_grow_born_busy() {
        let manager = manager_with(small_config(2, 0, 4));

        let acquisition = manager
            .acquire(PoolType::Normal, Priority::Normal, None)
            .await
            .unwrap();
        assert!(!acquisition.temporary);
        assert!(acquisition.entry_id.is_some());

        let stats = manager.stats(PoolType::Normal).await;
        assert_eq!(stats.size, 1);
        assert_eq!(stats.busy_count, 1);
        assert_eq!(stats.idle_count, 0);

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_release_then_affinity_hit() {
        let manager = manager_with(small_config(2, 0, 4));
        let fp = Some(42u64);

        let first = manager
            .acquire(PoolType::Normal, Priority::Normal, fp)
            .await
            .unwrap();
        let first_id = first.entry_id;
        assert!(!first.affinity_hit);

        let mut release = plain_release(&first);
        release.fingerprint = fp;
        manager.release(PoolType::Normal, release).await;

        let second = manager
            .acquire(PoolType::Normal, Priority::Normal, fp)
            .await
            .unwrap();
        assert!(second.affinity_hit);
        assert_eq!(second.entry_id, first_id);

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_least_used_prefers_fresh_worker() {
        let manager = manager_with(small_config(2, 0, 4));
        manager.warmup(PoolType::Normal, 2).await.unwrap();

        // Scan order picks the first zero-task worker; exercise it once.
        let veteran = manager
            .acquire(PoolType::Normal, Priority::Normal, None)
            .await
            .unwrap();
        manager
            .release(PoolType::Normal, plain_release(&veteran))
            .await;

        // With both idle, the never-used worker wins over the veteran.
        let fresh = manager
            .acquire(PoolType::Normal, Priority::Normal, None)
            .await
            .unwrap();
        assert_ne!(fresh.entry_id, veteran.entry_id);

        // Only the veteran is idle now.
        let again = manager
            .acquire(PoolType::Normal, Priority::Normal, None)
            .await
            .unwrap();
        assert_eq!(again.entry_id, veteran.entry_id);

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_temporary_overflow_and_queue_full() {
        let manager = manager_with(small_config(1, 1, 1));

        let pooled = manager
            .acquire(PoolType::Normal, Priority::Normal, None)
            .await
            .unwrap();
        let temp = manager
            .acquire(PoolType::Normal, Priority::Normal, None)
            .await
            .unwrap();
        assert!(temp.temporary);
        assert!(temp.entry_id.is_none());

        // Third acquisition queues (slot 1 of 1); the fourth overflows.
        let manager2 = manager.clone();
        let queued = tokio::spawn(async move {
            manager2
                .acquire(PoolType::Normal, Priority::Normal, None)
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let overflow = manager
            .acquire(PoolType::Normal, Priority::Normal, None)
            .await;
        assert!(matches!(
            overflow,
            Err(TaskError::QueueFull { max_size: 1 })
        ));

        // Releasing the pooled worker hands it to the queued waiter.
        manager.release(PoolType::Normal, plain_release(&pooled)).await;
        let handed = queued.await.unwrap().unwrap();
        assert_eq!(handed.entry_id, pooled.entry_id);

        manager.release(PoolType::Normal, plain_release(&handed)).await;
        manager.release(PoolType::Normal, plain_release(&temp)).await;
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_handoff_respects_priority_bands() {
        let manager = manager_with(small_config(1, 0, 10));

        let holder = manager
            .acquire(PoolType::Normal, Priority::Normal, None)
            .await
            .unwrap();

        let mut waiters = Vec::new();
        for priority in [Priority::Low, Priority::Normal, Priority::High] {
            let manager = manager.clone();
            waiters.push((
                priority,
                tokio::spawn(async move {
                    manager.acquire(PoolType::Normal, priority, None).await
                }),
            ));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Each release should wake exactly the highest queued band.
        let mut wake_order = Vec::new();
        let mut done = std::collections::HashSet::new();
        let mut current = holder;
        for _ in 0..3 {
            manager
                .release(PoolType::Normal, plain_release(&current))
                .await;
            tokio::time::sleep(Duration::from_millis(30)).await;

            let mut woken = None;
            for (idx, (priority, handle)) in waiters.iter().enumerate() {
                if !done.contains(&idx) && handle.is_finished() {
                    woken = Some((idx, *priority));
                    break;
                }
            }
            let (idx, priority) = woken.expect("a waiter should have been woken");
            done.insert(idx);
            wake_order.push(priority);
            current = (&mut waiters[idx].1).await.unwrap().unwrap();
        }

        assert_eq!(
            wake_order,
            vec![Priority::High, Priority::Normal, Priority::Low]
        );
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_force_terminated_release_evicts() {
        let manager = manager_with(small_config(2, 0, 4));

        let acquisition = manager
            .acquire(PoolType::Normal, Priority::Normal, None)
            .await
            .unwrap();
        let mut release = plain_release(&acquisition);
        release.failed = true;
        release.force_terminated = true;
        manager.release(PoolType::Normal, release).await;

        let stats = manager.stats(PoolType::Normal).await;
        assert_eq!(stats.size, 0);
        assert_eq!(stats.busy_count, 0);
        assert_eq!(stats.idle_count, 0);
        assert!(acquisition.worker.is_terminated());

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_idle_reclamation_keeps_floor() {
        let mut config = small_config(2, 0, 4);
        config.worker_idle_timeout = Duration::from_millis(30);
        let manager = manager_with(config);

        let a = manager
            .acquire(PoolType::Normal, Priority::Normal, None)
            .await
            .unwrap();
        let b = manager
            .acquire(PoolType::Normal, Priority::Normal, None)
            .await
            .unwrap();
        manager.release(PoolType::Normal, plain_release(&a)).await;
        manager.release(PoolType::Normal, plain_release(&b)).await;

        tokio::time::sleep(Duration::from_millis(120)).await;

        // One worker is reclaimed; min_threads keeps the other alive.
        let stats = manager.stats(PoolType::Normal).await;
        assert_eq!(stats.size, 1);
        assert_eq!(stats.idle_count, 1);

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_warmup_and_shutdown() {
        let manager = manager_with(small_config(3, 0, 4));

        let created = manager.warmup(PoolType::Normal, 5).await.unwrap();
        assert_eq!(created, 3);

        let stats = manager.stats(PoolType::Normal).await;
        assert_eq!(stats.size, 3);
        assert_eq!(stats.idle_count, 3);
        assert_eq!(stats.busy_count, 0);

        manager.shutdown().await;
        let stats = manager.stats(PoolType::Normal).await;
        assert_eq!(stats.size, 0);

        let refused = manager
            .acquire(PoolType::Normal, Priority::Normal, None)
            .await;
        assert!(matches!(refused, Err(TaskError::Aborted { .. })));
    }

    #[tokio::test]
    async fn test_counters_balance_at_rest() {
        let manager = manager_with(small_config(3, 0, 4));

        let a = manager
            .acquire(PoolType::Normal, Priority::Normal, None)
            .await
            .unwrap();
        let b = manager
            .acquire(PoolType::Normal, Priority::Normal, None)
            .await
            .unwrap();
        manager.release(PoolType::Normal, plain_release(&a)).await;

        let stats = manager.stats(PoolType::Normal).await;
        assert_eq!(stats.busy_count + stats.idle_count, stats.size);
        assert_eq!(stats.busy_count, 1);
        assert_eq!(stats.idle_count, 1);

        manager.release(PoolType::Normal, plain_release(&b)).await;
        manager.shutdown().await;
    }
}
