//! In-flight request coalescing
//!
//! Concurrent identical requests share a single dispatch; every sharer
//! observes the same settlement. Callables whose source looks
//! non-deterministic are conservatively bypassed.

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;
use turbine_config::CoalesceConfig;

use crate::descriptor::TaskDescriptor;
use crate::error::TaskResult;
use crate::keys;
use crate::metrics::EngineMetrics;
use crate::retry::RetryController;

/// Source tokens marking a callable as non-deterministic
///
/// Coalescing is only sound for pure callables; any of these appearing in
/// the source text disables it for that callable.
const NON_DETERMINISTIC_TOKENS: &[&str] = &[
    // Time sources
    "Date.now",
    "new Date",
    "SystemTime::now",
    "Instant::now",
    "Utc::now",
    "Local::now",
    // Random sources
    "Math.random",
    "thread_rng",
    "gen_range",
    // UUID generators
    "randomUUID",
    "new_v4",
    // High-resolution process clocks
    "process.hrtime",
    "performance.now",
];

type SharedExecution = Shared<BoxFuture<'static, TaskResult<JsonValue>>>;

/// Deduplicates identical in-flight requests
#[derive(Clone)]
pub struct Coalescer {
    retry: RetryController,
    state: Arc<CoalescerState>,
}

struct CoalescerState {
    enabled: bool,
    pattern_cache_cap: usize,
    in_flight: Mutex<HashMap<String, SharedExecution>>,
    /// fingerprint → is-deterministic decisions, half-cleared at capacity
    pattern_cache: Mutex<HashMap<u64, bool>>,
    metrics: Arc<EngineMetrics>,
}

impl Coalescer {
    pub fn new(
        retry: RetryController,
        config: &CoalesceConfig,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            retry,
            state: Arc::new(CoalescerState {
                enabled: config.enabled,
                pattern_cache_cap: config.pattern_cache_size.max(2),
                in_flight: Mutex::new(HashMap::new()),
                pattern_cache: Mutex::new(HashMap::new()),
                metrics,
            }),
        }
    }

    pub fn retry(&self) -> &RetryController {
        &self.retry
    }

    /// Execute a descriptor, sharing any identical in-flight dispatch
    pub async fn execute(&self, descriptor: TaskDescriptor) -> TaskResult<JsonValue> {
        if !self.should_coalesce(&descriptor) {
            return self.retry.execute(&descriptor).await;
        }

        let key = keys::in_flight_key(
            descriptor.callable.fingerprint(),
            &descriptor.args,
            descriptor.env.as_ref(),
        );

        let shared = {
            let mut in_flight = self.state.in_flight.lock();
            if let Some(existing) = in_flight.get(&key) {
                self.state.metrics.record_coalesced();
                trace!(key = %descriptor.callable.name, "joined in-flight dispatch");
                existing.clone()
            } else {
                self.state.metrics.record_unique();
                let retry = self.retry.clone();
                let state = Arc::clone(&self.state);
                let cleanup_key = key.clone();
                let execution = async move {
                    let outcome = retry.execute(&descriptor).await;
                    // Completion hook: later identical requests dispatch anew.
                    state.in_flight.lock().remove(&cleanup_key);
                    outcome
                }
                .boxed()
                .shared();
                in_flight.insert(key, execution.clone());
                execution
            }
        };

        shared.await
    }

    fn should_coalesce(&self, descriptor: &TaskDescriptor) -> bool {
        if !self.state.enabled || descriptor.no_coalesce {
            return false;
        }
        self.is_deterministic(descriptor)
    }

    fn is_deterministic(&self, descriptor: &TaskDescriptor) -> bool {
        let fingerprint = descriptor.callable.fingerprint();
        if let Some(&decision) = self.state.pattern_cache.lock().get(&fingerprint) {
            return decision;
        }

        let source = &descriptor.callable.source;
        let deterministic = !NON_DETERMINISTIC_TOKENS
            .iter()
            .any(|token| source.contains(token));

        let mut cache = self.state.pattern_cache.lock();
        if cache.len() >= self.state.pattern_cache_cap {
            let victims: Vec<u64> = cache.keys().copied().take(cache.len() / 2).collect();
            for victim in victims {
                cache.remove(&victim);
            }
        }
        cache.insert(fingerprint, deterministic);
        deterministic
    }

    /// Point-in-time coalescing counters
    pub fn snapshot(&self) -> CoalescerSnapshot {
        let metrics = self.state.metrics.snapshot();
        let total = metrics.coalesced + metrics.unique;
        CoalescerSnapshot {
            coalesced: metrics.coalesced,
            unique: metrics.unique,
            in_flight: self.state.in_flight.lock().len(),
            rate: if total == 0 {
                0.0
            } else {
                metrics.coalesced as f64 / total as f64
            },
        }
    }
}

/// Coalescer counters at one observation point
#[derive(Debug, Clone, Serialize)]
pub struct CoalescerSnapshot {
    pub coalesced: u64,
    pub unique: u64,
    pub in_flight: usize,
    pub rate: f64,
}
