//! Retry controller wrapping single-shot execution

use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use turbine_config::RetryConfig;

use crate::backoff::Backoff;
use crate::descriptor::TaskDescriptor;
use crate::engine::TaskEngine;
use crate::error::TaskResult;
use crate::metrics::EngineMetrics;

/// Bounded exponential-backoff retry policy
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay,
            max_delay: config.max_delay,
            backoff_factor: config.backoff_factor,
        }
    }
}

/// Re-attempts worker failures with backoff and jitter
///
/// `ABORTED` and `TIMEOUT` are caller-intent failures and are never
/// retried; `QUEUE_FULL` and `VALIDATION` are left to the caller.
#[derive(Clone)]
pub struct RetryController {
    engine: TaskEngine,
    metrics: Arc<EngineMetrics>,
}

impl RetryController {
    pub fn new(engine: TaskEngine, metrics: Arc<EngineMetrics>) -> Self {
        Self { engine, metrics }
    }

    pub fn engine(&self) -> &TaskEngine {
        &self.engine
    }

    /// Execute a descriptor, retrying per its policy
    ///
    /// Without a policy this is a direct delegation to the engine.
    pub async fn execute(&self, descriptor: &TaskDescriptor) -> TaskResult<JsonValue> {
        let Some(policy) = descriptor.retry.clone() else {
            return self.engine.execute_once(descriptor).await;
        };

        let backoff = Backoff::new(policy.base_delay, policy.max_delay, policy.backoff_factor);
        let mut attempt = 0u32;
        loop {
            match self.engine.execute_once(descriptor).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(
                            callable = %descriptor.callable.name,
                            attempts = attempt + 1,
                            "task succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !error.is_retryable() || attempt + 1 >= policy.max_attempts {
                        return Err(error);
                    }
                    let delay = backoff.jittered(attempt);
                    warn!(
                        callable = %descriptor.callable.name,
                        attempt,
                        %error,
                        ?delay,
                        "task failed; retrying"
                    );
                    self.metrics.record_retry();
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
