//! Incremental producer protocol
//!
//! Streams dispatch on the dedicated generator pool and bypass both the
//! retry controller and the coalescer. The consumer pulls values lazily;
//! cancelling the reader terminates the worker.

use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;
use uuid::Uuid;

use turbine_ipc::{MessageEnvelope, WorkerErrorInfo, WorkerReply, WorkerRequest};

use crate::descriptor::{PoolType, TaskDescriptor};
use crate::engine::forward_worker_log;
use crate::error::{TaskError, TaskResult};
use crate::metrics::EngineMetrics;
use crate::pool::{PoolManager, Release};
use crate::worker::WorkerHandle;

type ReplyGuard = OwnedMutexGuard<mpsc::Receiver<MessageEnvelope<WorkerReply>>>;

/// Dispatches incremental producers on the generator pool
#[derive(Clone)]
pub struct StreamEngine {
    pool: PoolManager,
    metrics: Arc<EngineMetrics>,
}

impl StreamEngine {
    pub fn new(pool: PoolManager, metrics: Arc<EngineMetrics>) -> Self {
        Self { pool, metrics }
    }

    /// Start a producer and hand back the pull-based reader
    pub async fn open(&self, descriptor: &TaskDescriptor) -> TaskResult<TaskStream> {
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
            .acquire(PoolType::Generator, descriptor.priority, Some(fingerprint))
            .await?;
        let worker = acquisition.worker.clone();
        let correlation_id = Uuid::new_v4();
        let started = Instant::now();

        let replies = worker.replies().lock_owned().await;
        let request = WorkerRequest::ExecuteStream {
            callable: descriptor.callable.name.clone(),
            args: descriptor.args.clone(),
            context: descriptor.env.clone(),
            correlation_id,
        };

        if worker.send(request).await.is_err() {
            drop(replies);
            worker.terminate();
            self.pool
                .release(
                    PoolType::Generator,
                    Release {
                        entry_id: acquisition.entry_id,
                        worker,
                        temporary: acquisition.temporary,
                        execution_time: started.elapsed(),
                        failed: true,
                        fingerprint: Some(fingerprint),
                        force_terminated: true,
                    },
                )
                .await;
            return Err(TaskError::worker(WorkerErrorInfo::new(
                "DispatchFailed",
                "worker channel closed before dispatch",
            )));
        }

        Ok(TaskStream {
            pool: self.pool.clone(),
            metrics: Arc::clone(&self.metrics),
            worker,
            entry_id: acquisition.entry_id,
            temporary: acquisition.temporary,
            fingerprint,
            replies: Some(replies),
            return_value: None,
            started,
            finished: false,
        })
    }
}

enum Step {
    Item(JsonValue),
    End,
    Failed(WorkerErrorInfo),
    Exit(i32),
}

enum StreamOutcome {
    Completed,
    Failed,
    Cancelled,
}

/// Lazy, cancellable sequence of produced values
pub struct TaskStream {
    pool: PoolManager,
    metrics: Arc<EngineMetrics>,
    worker: WorkerHandle,
    entry_id: Option<u64>,
    temporary: bool,
    fingerprint: u64,
    replies: Option<ReplyGuard>,
    return_value: Option<JsonValue>,
    started: Instant,
    finished: bool,
}

impl std::fmt::Debug for TaskStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStream").finish_non_exhaustive()
    }
}

impl TaskStream {
    /// Pull the next value; `None` once the producer has ended
    pub async fn next(&mut self) -> Option<TaskResult<JsonValue>> {
        if self.finished {
            return None;
        }
        let mut replies = self.replies.take()?;
        let worker = self.worker.clone();

        let step = loop {
            tokio::select! {
                biased;

                message = replies.recv() => match message {
                    Some(envelope) => match envelope.message {
                        WorkerReply::Yield { value, .. } => break Step::Item(value),
                        WorkerReply::Return { value, .. } => {
                            self.return_value = Some(value);
                        }
                        WorkerReply::End { .. } => break Step::End,
                        WorkerReply::Failed { error, .. } => break Step::Failed(error),
                        WorkerReply::Log { level, args } => {
                            forward_worker_log(worker.id(), &level, &args);
                        }
                        other => {
                            debug!(worker_id = worker.id(), ?other, "ignoring out-of-protocol reply");
                        }
                    },
                    None => break Step::Exit(0),
                },

                code = worker.exited() => break Step::Exit(code),
            }
        };

        match step {
            Step::Item(value) => {
                self.replies = Some(replies);
                Some(Ok(value))
            }
            Step::End => {
                drop(replies);
                self.finish(StreamOutcome::Completed, false).await;
                None
            }
            Step::Failed(error) => {
                drop(replies);
                self.finish(StreamOutcome::Failed, false).await;
                Some(Err(TaskError::worker(error)))
            }
            Step::Exit(code) => {
                drop(replies);
                self.finish(StreamOutcome::Failed, true).await;
                Some(Err(TaskError::worker_exit(code)))
            }
        }
    }

    /// Drain the remaining values, failing fast on a producer error
    pub async fn collect(mut self) -> TaskResult<(Vec<JsonValue>, Option<JsonValue>)> {
        let mut values = Vec::new();
        while let Some(step) = self.next().await {
            values.push(step?);
        }
        Ok((values, self.return_value.clone()))
    }

    /// Producer return value, available after the stream ends cleanly
    pub fn return_value(&self) -> Option<&JsonValue> {
        self.return_value.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Stop consuming: terminates the worker and releases its slot
    pub async fn cancel(&mut self) {
        if self.finished {
            return;
        }
        drop(self.replies.take());
        self.finish(StreamOutcome::Cancelled, true).await;
    }

    async fn finish(&mut self, outcome: StreamOutcome, force_terminated: bool) {
        if self.finished {
            return;
        }
        self.finished = true;

        if force_terminated {
            self.worker.terminate();
        }

        let failed = matches!(outcome, StreamOutcome::Failed);
        self.pool
            .release(
                PoolType::Generator,
                Release {
                    entry_id: self.entry_id,
                    worker: self.worker.clone(),
                    temporary: self.temporary,
                    execution_time: self.started.elapsed(),
                    failed,
                    fingerprint: Some(self.fingerprint),
                    force_terminated,
                },
            )
            .await;

        match outcome {
            StreamOutcome::Completed => self.metrics.record_task_executed(),
            StreamOutcome::Failed => self.metrics.record_task_failed(),
            StreamOutcome::Cancelled => {}
        }
    }
}

impl Drop for TaskStream {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // Dropped mid-stream: tear down as a cancellation. Release has to
        // happen on the runtime since Drop cannot await.
        self.finished = true;
        self.worker.terminate();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let pool = self.pool.clone();
            let release = Release {
                entry_id: self.entry_id,
                worker: self.worker.clone(),
                temporary: self.temporary,
                execution_time: self.started.elapsed(),
                failed: false,
                fingerprint: Some(self.fingerprint),
                force_terminated: true,
            };
            handle.spawn(async move {
                pool.release(PoolType::Generator, release).await;
            });
        }
    }
}
