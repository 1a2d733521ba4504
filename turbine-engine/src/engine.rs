//! Single-shot task execution
//!
//! Acquire → dispatch → await → release, with timeout and cancellation
//! multiplexed into a single-shot settle. Hard stops (timeout, abort, exit)
//! evict the worker so the pool is never left holding a process in an
//! indeterminate state.

use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use turbine_ipc::{WorkerErrorInfo, WorkerReply, WorkerRequest};

use crate::descriptor::TaskDescriptor;
use crate::error::{TaskError, TaskResult};
use crate::metrics::EngineMetrics;
use crate::pool::{PoolManager, Release};

/// Executes one task at a time per worker
#[derive(Clone)]
pub struct TaskEngine {
    pool: PoolManager,
    metrics: Arc<EngineMetrics>,
}

impl TaskEngine {
    pub fn new(pool: PoolManager, metrics: Arc<EngineMetrics>) -> Self {
        Self { pool, metrics }
    }

    pub fn pool(&self) -> &PoolManager {
        &self.pool
    }

    /// Execute a descriptor exactly once
    ///
    /// An already-triggered cancellation token fails the call before the
    /// pool is touched. After dispatch, the first of reply, worker exit,
    /// timeout, or cancellation settles the call; later events are no-ops.
    pub async fn execute_once(&self, descriptor: &TaskDescriptor) -> TaskResult<JsonValue> {
        if let Some(token) = &descriptor.cancellation {
            if token.is_cancelled() {
                return Err(TaskError::Aborted {
                    reason: token.reason(),
                });
            }
        }

        let fingerprint = descriptor.callable.fingerprint();
        let acquisition = self
            .pool
            .acquire(descriptor.pool_type, descriptor.priority, Some(fingerprint))
            .await?;

        let worker = acquisition.worker.clone();
        let correlation_id = Uuid::new_v4();
        let started = Instant::now();
        trace!(
            worker_id = worker.id(),
            callable = %descriptor.callable.name,
            %correlation_id,
            affinity_hit = acquisition.affinity_hit,
            "dispatching task"
        );

        let request = WorkerRequest::Execute {
            callable: descriptor.callable.name.clone(),
            args: descriptor.args.clone(),
            context: descriptor.env.clone(),
            transfer: descriptor.transfer.clone(),
            correlation_id,
        };

        let mut replies = worker.replies().lock_owned().await;
        let (outcome, force_terminated) = match worker.send(request).await {
            Err(_) => (
                Err(TaskError::worker(WorkerErrorInfo::new(
                    "DispatchFailed",
                    "worker channel closed before dispatch",
                ))),
                true,
            ),
            Ok(()) => {
                let token = descriptor.cancellation.clone();
                let timeout = descriptor.timeout;

                let sleep_fut = async {
                    match timeout {
                        Some(duration) => tokio::time::sleep(duration).await,
                        None => std::future::pending().await,
                    }
                };
                tokio::pin!(sleep_fut);

                let cancel_fut = async {
                    match &token {
                        Some(token) => token.cancelled().await,
                        None => std::future::pending().await,
                    }
                };
                tokio::pin!(cancel_fut);

                loop {
                    tokio::select! {
                        biased;

                        message = replies.recv() => match message {
                            Some(envelope) => match envelope.message {
                                WorkerReply::Log { level, args } => {
                                    forward_worker_log(worker.id(), &level, &args);
                                }
                                WorkerReply::Completed { value, .. } => {
                                    break (Ok(value), false);
                                }
                                WorkerReply::Failed { error, .. } => {
                                    break (Err(TaskError::worker(error)), false);
                                }
                                other => {
                                    debug!(worker_id = worker.id(), ?other, "ignoring out-of-protocol reply");
                                }
                            },
                            None => {
                                break (
                                    Err(TaskError::worker(WorkerErrorInfo::new(
                                        "WorkerExit",
                                        "worker channel closed before reply",
                                    ))),
                                    true,
                                );
                            }
                        },

                        code = worker.exited() => {
                            break (Err(TaskError::worker_exit(code)), true);
                        }

                        _ = &mut sleep_fut => {
                            let timeout_ms = timeout.map(|d| d.as_millis() as u64).unwrap_or(0);
                            warn!(worker_id = worker.id(), timeout_ms, "task timed out; terminating worker");
                            break (Err(TaskError::Timeout { timeout_ms }), true);
                        }

                        _ = &mut cancel_fut => {
                            let reason = token.as_ref().and_then(|t| t.reason());
                            debug!(worker_id = worker.id(), "task aborted; terminating worker");
                            break (Err(TaskError::Aborted { reason }), true);
                        }
                    }
                }
            }
        };

        // Free the reply channel before the worker can be handed to the
        // next waiter.
        drop(replies);

        if force_terminated {
            worker.terminate();
        }

        self.pool
            .release(
                descriptor.pool_type,
                Release {
                    entry_id: acquisition.entry_id,
                    worker,
                    temporary: acquisition.temporary,
                    execution_time: started.elapsed(),
                    failed: outcome.is_err(),
                    fingerprint: Some(fingerprint),
                    force_terminated,
                },
            )
            .await;

        match &outcome {
            Ok(_) => self.metrics.record_task_executed(),
            Err(error) => {
                self.metrics.record_task_failed();
                debug!(callable = %descriptor.callable.name, %error, "task failed");
            }
        }
        outcome
    }
}

/// Forward a worker log message to the host logger; never settles a task
pub(crate) fn forward_worker_log(worker_id: &str, level: &str, args: &[String]) {
    let line = args.join(" ");
    match level {
        "error" => error!(worker_id, "{}", line),
        "warn" => warn!(worker_id, "{}", line),
        "debug" => debug!(worker_id, "{}", line),
        "trace" => trace!(worker_id, "{}", line),
        _ => info!(worker_id, "{}", line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::descriptor::{Callable, PoolType, Priority};
    use crate::registry::{CallableRegistry, Handler};
    use crate::worker::TaskWorkerSpawner;
    use serde_json::json;
    use std::time::Duration;
    use turbine_config::PoolConfig;

    fn test_registry() -> Arc<CallableRegistry> {
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
            "apply_tax",
            "fn apply_tax(x) { x * TAX }",
            Handler::unary(|ctx| {
                let x = ctx.arg(0).and_then(JsonValue::as_f64).unwrap_or(0.0);
                let tax = ctx
                    .env_value("TAX")
                    .and_then(JsonValue::as_f64)
                    .ok_or_else(|| WorkerErrorInfo::new("ReferenceError", "TAX is not defined"))?;
                Ok(json!(x * tax))
            }),
        );
        registry.register(
            "busy_loop",
            "fn busy_loop() { while (true) {} }",
            Handler::unary_async(|_ctx| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(json!("unreachable"))
            }),
        );
        registry.register(
            "chatty",
            "fn chatty(x) { console.log('seen', x); x }",
            Handler::unary(|ctx| {
                ctx.log("info", "processing input");
                Ok(ctx.arg(0).cloned().unwrap_or(JsonValue::Null))
            }),
        );
        registry.register(
            "always_fails",
            "fn always_fails() { throw new Error('nope') }",
            Handler::unary(|_| -> Result<JsonValue, WorkerErrorInfo> {
                Err(WorkerErrorInfo::new("Error", "nope").with_stack("at always_fails:1"))
            }),
        );
        Arc::new(registry)
    }

    fn test_engine(pool_size: usize) -> TaskEngine {
        let metrics = Arc::new(EngineMetrics::new());
        let spawner = Arc::new(TaskWorkerSpawner::new(test_registry(), 16));
        let config = PoolConfig {
            pool_size,
            max_temporary_workers: 0,
            ..Default::default()
        };
        let pool = PoolManager::new(config, spawner, Arc::clone(&metrics));
        TaskEngine::new(pool, metrics)
    }

    fn descriptor(name: &str, args: Vec<JsonValue>) -> TaskDescriptor {
        TaskDescriptor::new(Callable::named(name), args)
    }

    #[tokio::test]
    async fn test_basic_add() {
        let engine = test_engine(2);

        let value = engine
            .execute_once(&descriptor("add", vec![json!(2), json!(3)]))
            .await
            .unwrap();
        assert_eq!(value, json!(5));
        assert_eq!(engine.metrics.snapshot().tasks_executed, 1);

        engine.pool().shutdown().await;
    }

    #[tokio::test]
    async fn test_env_injection() {
        let engine = test_engine(2);

        let mut task = descriptor("apply_tax", vec![json!(100)]);
        task.env = json!({"TAX": 0.2}).as_object().cloned();

        let value = engine.execute_once(&task).await.unwrap();
        assert_eq!(value, json!(20.0));

        engine.pool().shutdown().await;
    }

    #[tokio::test]
    async fn test_timeout_terminates_and_evicts() {
        let engine = test_engine(2);

        let mut task = descriptor("busy_loop", vec![]);
        task.timeout = Some(Duration::from_millis(50));

        let error = engine.execute_once(&task).await.unwrap_err();
        assert_eq!(error, TaskError::Timeout { timeout_ms: 50 });

        // The runaway worker never returns to the pool.
        let stats = engine.pool().stats(PoolType::Normal).await;
        assert_eq!(stats.size, 0);
        assert_eq!(engine.metrics.snapshot().tasks_failed, 1);

        // The pool still serves fresh submissions afterwards.
        let value = engine
            .execute_once(&descriptor("add", vec![json!(1), json!(1)]))
            .await
            .unwrap();
        assert_eq!(value, json!(2));

        engine.pool().shutdown().await;
    }

    #[tokio::test]
    async fn test_pre_aborted_token_skips_pool() {
        let engine = test_engine(2);

        let token = CancelToken::new();
        token.cancel_with_reason("caller gave up");

        let mut task = descriptor("add", vec![json!(1), json!(2)]);
        task.cancellation = Some(token);

        let error = engine.execute_once(&task).await.unwrap_err();
        assert_eq!(
            error,
            TaskError::Aborted {
                reason: Some("caller gave up".to_string())
            }
        );

        // No worker was acquired and nothing executed.
        let stats = engine.pool().stats(PoolType::Normal).await;
        assert_eq!(stats.size, 0);
        assert_eq!(engine.metrics.snapshot().tasks_executed, 0);

        engine.pool().shutdown().await;
    }

    #[tokio::test]
    async fn test_cancellation_mid_flight() {
        let engine = test_engine(2);

        let token = CancelToken::new();
        let mut task = descriptor("busy_loop", vec![]);
        task.cancellation = Some(token.clone());

        let engine_clone = engine.clone();
        let running = tokio::spawn(async move { engine_clone.execute_once(&task).await });

        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel_with_reason("shutting down");

        let error = running.await.unwrap().unwrap_err();
        assert_eq!(
            error,
            TaskError::Aborted {
                reason: Some("shutting down".to_string())
            }
        );
        assert_eq!(engine.pool().stats(PoolType::Normal).await.size, 0);

        engine.pool().shutdown().await;
    }

    #[tokio::test]
    async fn test_worker_error_copied_through() {
        let engine = test_engine(2);

        let error = engine
            .execute_once(&descriptor("always_fails", vec![]))
            .await
            .unwrap_err();
        match error {
            TaskError::Worker { info } => {
                assert_eq!(info.name, "Error");
                assert_eq!(info.message, "nope");
                assert_eq!(info.stack.as_deref(), Some("at always_fails:1"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // A worker-reported failure is not a crash; the entry survives.
        assert_eq!(engine.pool().stats(PoolType::Normal).await.size, 1);

        engine.pool().shutdown().await;
    }

    #[tokio::test]
    async fn test_log_messages_do_not_settle() {
        let engine = test_engine(2);

        let value = engine
            .execute_once(&descriptor("chatty", vec![json!("payload")]))
            .await
            .unwrap();
        assert_eq!(value, json!("payload"));

        engine.pool().shutdown().await;
    }

    #[tokio::test]
    async fn test_busy_flag_serializes_worker() {
        let engine = test_engine(1);

        // Two concurrent submissions share one worker; both complete.
        let first = engine.clone();
        let second = engine.clone();
        let (a, b) = tokio::join!(
            tokio::spawn(async move {
                first
                    .execute_once(&descriptor("add", vec![json!(1), json!(2)]))
                    .await
            }),
            tokio::spawn(async move {
                second
                    .execute_once(&descriptor("add", vec![json!(3), json!(4)]))
                    .await
            }),
        );
        assert_eq!(a.unwrap().unwrap(), json!(3));
        assert_eq!(b.unwrap().unwrap(), json!(7));

        let stats = engine.pool().stats(PoolType::Normal).await;
        assert_eq!(stats.size, 1);

        engine.pool().shutdown().await;
    }

    #[tokio::test]
    async fn test_priority_is_plumbed() {
        let engine = test_engine(1);
        let mut task = descriptor("add", vec![json!(1), json!(1)]);
        task.priority = Priority::High;
        assert_eq!(engine.execute_once(&task).await.unwrap(), json!(2));
        engine.pool().shutdown().await;
    }
}
