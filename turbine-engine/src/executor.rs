//! Engine facade
//!
//! Wires the pool, task engine, retry controller, coalescer, stream engine,
//! and turbo layer together behind one host-facing surface. A submission
//! flows coalescer → retry → engine → pool; streams and turbo dispatch
//! through the pool directly.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;
use turbine_config::TurbineConfig;

use crate::coalesce::{Coalescer, CoalescerSnapshot};
use crate::descriptor::{PoolType, TaskDescriptor};
use crate::engine::TaskEngine;
use crate::error::{SettledResult, TaskResult};
use crate::metrics::{EngineMetrics, MetricsSnapshot};
use crate::pool::{PoolManager, PoolStats};
use crate::registry::CallableRegistry;
use crate::retry::{RetryController, RetryPolicy};
use crate::stream::{StreamEngine, TaskStream};
use crate::turbo::Turbo;
use crate::worker::{TaskWorkerSpawner, WorkerSpawner};

/// Task executor trait for different execution strategies
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Execute a task descriptor to a single value
    async fn execute(&self, descriptor: TaskDescriptor) -> TaskResult<JsonValue>;

    /// Execute in safe mode; the call never fails
    async fn execute_settled(&self, descriptor: TaskDescriptor) -> SettledResult;

    /// Check that the executor can still serve work
    async fn health_check(&self) -> TaskResult<()>;
}

/// The task execution engine
#[derive(Clone)]
pub struct Turbine {
    config: TurbineConfig,
    registry: Arc<CallableRegistry>,
    metrics: Arc<EngineMetrics>,
    pool: PoolManager,
    coalescer: Coalescer,
    streams: StreamEngine,
    turbo: Turbo,
}

impl Turbine {
    /// Build an engine with the built-in task worker spawner
    pub fn new(config: TurbineConfig, registry: Arc<CallableRegistry>) -> Self {
        let spawner = Arc::new(TaskWorkerSpawner::new(
            Arc::clone(&registry),
            config.pool.function_cache_size,
        ));
        Self::with_spawner(config, registry, spawner)
    }

    /// Build an engine around a custom worker spawner
    pub fn with_spawner(
        config: TurbineConfig,
        registry: Arc<CallableRegistry>,
        spawner: Arc<dyn WorkerSpawner>,
    ) -> Self {
        let metrics = Arc::new(EngineMetrics::new());
        let pool = PoolManager::new(config.pool.clone(), spawner, Arc::clone(&metrics));
        let engine = TaskEngine::new(pool.clone(), Arc::clone(&metrics));
        let retry = RetryController::new(engine, Arc::clone(&metrics));
        let coalescer = Coalescer::new(retry, &config.coalesce, Arc::clone(&metrics));
        let streams = StreamEngine::new(pool.clone(), Arc::clone(&metrics));
        let turbo = Turbo::new(
            pool.clone(),
            Arc::clone(&registry),
            config.turbo.clone(),
            config.pool.pool_size,
        );
        info!(
            pool_size = config.pool.pool_size,
            coalescing = config.coalesce.enabled,
            "engine ready"
        );
        Self {
            config,
            registry,
            metrics,
            pool,
            coalescer,
            streams,
            turbo,
        }
    }

    /// Submit a task for asynchronous execution
    pub async fn submit(&self, descriptor: TaskDescriptor) -> TaskResult<JsonValue> {
        descriptor.validate()?;
        self.coalescer.execute(descriptor).await
    }

    /// Safe-mode submission: the call itself never fails, failures are
    /// carried in the returned wrapper
    pub async fn submit_settled(&self, mut descriptor: TaskDescriptor) -> SettledResult {
        descriptor.safe = true;
        SettledResult::from(self.submit(descriptor).await)
    }

    /// Start an incremental producer on the generator pool
    ///
    /// Streams bypass the retry controller and the coalescer.
    pub async fn stream(&self, descriptor: TaskDescriptor) -> TaskResult<TaskStream> {
        descriptor.validate()?;
        self.streams.open(&descriptor).await
    }

    /// Parallel array operations
    pub fn turbo(&self) -> &Turbo {
        &self.turbo
    }

    pub fn registry(&self) -> &Arc<CallableRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &TurbineConfig {
        &self.config
    }

    /// Retry policy seeded from the configured defaults
    pub fn default_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.config.retry)
    }

    /// Pre-spawn idle workers
    pub async fn warmup(&self, pool_type: PoolType, count: usize) -> TaskResult<usize> {
        self.pool.warmup(pool_type, count).await
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn coalescing(&self) -> CoalescerSnapshot {
        self.coalescer.snapshot()
    }

    pub async fn pool_stats(&self, pool_type: PoolType) -> PoolStats {
        self.pool.stats(pool_type).await
    }

    /// Terminate every worker and refuse further submissions
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

#[async_trait]
impl TaskExecutor for Turbine {
    async fn execute(&self, descriptor: TaskDescriptor) -> TaskResult<JsonValue> {
        self.submit(descriptor).await
    }

    async fn execute_settled(&self, descriptor: TaskDescriptor) -> SettledResult {
        self.submit_settled(descriptor).await
    }

    async fn health_check(&self) -> TaskResult<()> {
        if self.pool.is_shut_down() {
            return Err(crate::error::TaskError::Aborted {
                reason: Some("engine shut down".to_string()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Callable;
    use crate::error::TaskError;
    use crate::registry::Handler;
    use serde_json::json;
    use turbine_config::PoolConfig;
    use turbine_ipc::WorkerErrorInfo;

    fn test_turbine() -> Turbine {
        let registry = CallableRegistry::new();
        registry.register(
            "add",
            "fn add(a, b) { a + b }",
            Handler::unary(|ctx| {
                let a = ctx.arg(0).and_then(JsonValue::as_i64).unwrap_or(0);
                let b = ctx.arg(1).and_then(JsonValue::as_i64).unwrap_or(0);
                Ok(json!(a + b))
            }),
        );
        registry.register(
            "always_fails",
            "fn always_fails() { throw new Error('nope') }",
            Handler::unary(|_| -> Result<JsonValue, WorkerErrorInfo> {
                Err(WorkerErrorInfo::new("Error", "nope"))
            }),
        );

        let config = TurbineConfig {
            pool: PoolConfig {
                pool_size: 2,
                ..Default::default()
            },
            ..Default::default()
        };
        Turbine::new(config, Arc::new(registry))
    }

    #[tokio::test]
    async fn test_submit_roundtrip() {
        let turbine = test_turbine();

        let value = turbine
            .submit(TaskDescriptor::new(
                Callable::named("add"),
                vec![json!(2), json!(3)],
            ))
            .await
            .unwrap();
        assert_eq!(value, json!(5));
        assert_eq!(turbine.metrics().tasks_executed, 1);

        turbine.shutdown().await;
    }

    #[tokio::test]
    async fn test_submit_validates_descriptor() {
        let turbine = test_turbine();

        let error = turbine
            .submit(TaskDescriptor::new(Callable::named(""), vec![]))
            .await
            .unwrap_err();
        assert!(matches!(error, TaskError::Validation { .. }));

        turbine.shutdown().await;
    }

    #[tokio::test]
    async fn test_settled_wrapper_never_fails() {
        let turbine = test_turbine();

        let fulfilled = turbine
            .submit_settled(TaskDescriptor::new(
                Callable::named("add"),
                vec![json!(1), json!(1)],
            ))
            .await;
        assert!(fulfilled.is_fulfilled());
        assert_eq!(fulfilled.value(), Some(&json!(2)));

        let rejected = turbine
            .submit_settled(TaskDescriptor::new(Callable::named("always_fails"), vec![]))
            .await;
        assert!(!rejected.is_fulfilled());
        assert!(matches!(
            rejected.error(),
            Some(TaskError::Worker { .. })
        ));

        turbine.shutdown().await;
    }

    #[tokio::test]
    async fn test_warmup_and_stats() {
        let turbine = test_turbine();

        let created = turbine.warmup(PoolType::Normal, 2).await.unwrap();
        assert_eq!(created, 2);

        let stats = turbine.pool_stats(PoolType::Normal).await;
        assert_eq!(stats.size, 2);
        assert_eq!(stats.idle_count, 2);

        turbine.shutdown().await;
        let stats = turbine.pool_stats(PoolType::Normal).await;
        assert_eq!(stats.size, 0);
    }

    #[tokio::test]
    async fn test_task_executor_trait() {
        let turbine = test_turbine();
        let executor: &dyn TaskExecutor = &turbine;

        assert!(executor.health_check().await.is_ok());
        let value = executor
            .execute(TaskDescriptor::new(
                Callable::named("add"),
                vec![json!(2), json!(2)],
            ))
            .await
            .unwrap();
        assert_eq!(value, json!(4));

        turbine.shutdown().await;
        assert!(turbine.health_check().await.is_err());
    }

    #[tokio::test]
    async fn test_default_retry_policy_follows_config() {
        let turbine = test_turbine();
        let policy = turbine.default_retry_policy();
        assert_eq!(policy.max_attempts, turbine.config().retry.max_attempts);
        turbine.shutdown().await;
    }
}
