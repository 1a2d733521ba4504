//! Parallel array processing
//!
//! Partitions an input across the pool in contiguous ordered chunks,
//! dispatches them concurrently at high priority, and merges in input
//! order. The first chunk failure aborts the whole run; chunks that were
//! acquired but not yet dispatched release their workers untouched.

use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::debug;
use turbine_config::TurboConfig;
use uuid::Uuid;

use turbine_ipc::{
    TurboChunkResult, TurboOp, TurboPayload, WorkerErrorInfo, WorkerReply, WorkerRequest,
};

use crate::descriptor::{Callable, PoolType, Priority};
use crate::engine::forward_worker_log;
use crate::error::{TaskError, TaskResult};
use crate::pool::{PoolManager, Release};
use crate::registry::{CallContext, CallableRegistry, Handler};

/// One parallel run's result plus how wide it actually fanned out
#[derive(Debug, Clone)]
pub struct TurboRun<T> {
    pub result: T,
    pub workers_used: usize,
}

/// Parallel map/filter/reduce over the normal pool
#[derive(Clone)]
pub struct Turbo {
    pool: PoolManager,
    registry: Arc<CallableRegistry>,
    config: TurboConfig,
    pool_size: usize,
}

impl Turbo {
    pub fn new(
        pool: PoolManager,
        registry: Arc<CallableRegistry>,
        config: TurboConfig,
        pool_size: usize,
    ) -> Self {
        Self {
            pool,
            registry,
            config,
            pool_size,
        }
    }

    /// Workers and chunk size for an input of length `n`
    ///
    /// Inputs under the parallel threshold fall back to a single dispatch
    /// unless the caller forces fan-out.
    fn plan(&self, n: usize, force_parallel: bool) -> (usize, usize) {
        if n == 0 {
            return (0, 0);
        }
        if n < self.config.parallel_threshold && !force_parallel {
            return (1, n);
        }
        let cap = self.config.max_workers.unwrap_or(self.pool_size).max(1);
        let by_items = n.div_ceil(self.config.min_items_per_worker).max(1);
        let workers = cap.min(by_items);
        (workers, n.div_ceil(workers))
    }

    /// Element-wise transform preserving input order
    pub async fn map(&self, callable: &Callable, items: Vec<JsonValue>) -> TaskResult<Vec<JsonValue>> {
        Ok(self.map_run(callable, items, false).await?.result)
    }

    pub async fn map_run(
        &self,
        callable: &Callable,
        items: Vec<JsonValue>,
        force_parallel: bool,
    ) -> TaskResult<TurboRun<Vec<JsonValue>>> {
        let n = items.len();
        let (workers, chunk_size) = self.plan(n, force_parallel);
        if workers == 0 {
            return Ok(TurboRun {
                result: Vec::new(),
                workers_used: 0,
            });
        }

        let chunks = value_chunks(items, chunk_size);
        let results = self.run_chunks(TurboOp::Map, callable, chunks, None).await?;

        // Map output length equals input length; offsets are implicit in
        // the ordered concatenation.
        let mut out = Vec::with_capacity(n);
        for result in results {
            out.extend(expect_values(result)?);
        }
        Ok(TurboRun {
            result: out,
            workers_used: workers,
        })
    }

    /// Keep elements whose predicate result is truthy, preserving order
    pub async fn filter(
        &self,
        callable: &Callable,
        items: Vec<JsonValue>,
    ) -> TaskResult<Vec<JsonValue>> {
        Ok(self.filter_run(callable, items, false).await?.result)
    }

    pub async fn filter_run(
        &self,
        callable: &Callable,
        items: Vec<JsonValue>,
        force_parallel: bool,
    ) -> TaskResult<TurboRun<Vec<JsonValue>>> {
        let n = items.len();
        let (workers, chunk_size) = self.plan(n, force_parallel);
        if workers == 0 {
            return Ok(TurboRun {
                result: Vec::new(),
                workers_used: 0,
            });
        }

        let chunks = value_chunks(items, chunk_size);
        let results = self
            .run_chunks(TurboOp::Filter, callable, chunks, None)
            .await?;

        // Chunks are variable length: sum first, then copy in order.
        let mut kept = Vec::with_capacity(results.len());
        for result in results {
            kept.push(expect_values(result)?);
        }
        let total: usize = kept.iter().map(Vec::len).sum();
        let mut out = Vec::with_capacity(total);
        for items in kept {
            out.extend(items);
        }
        Ok(TurboRun {
            result: out,
            workers_used: workers,
        })
    }

    /// Reduce with a seed
    ///
    /// Each worker folds its chunk from `init`, and the partials are folded
    /// again from `init` in chunk order. This is only correct when the
    /// callable is associative and `init` is a left-identity for it.
    pub async fn reduce(
        &self,
        callable: &Callable,
        init: JsonValue,
        items: Vec<JsonValue>,
    ) -> TaskResult<JsonValue> {
        Ok(self.reduce_run(callable, init, items, false).await?.result)
    }

    pub async fn reduce_run(
        &self,
        callable: &Callable,
        init: JsonValue,
        items: Vec<JsonValue>,
        force_parallel: bool,
    ) -> TaskResult<TurboRun<JsonValue>> {
        let n = items.len();
        let (workers, chunk_size) = self.plan(n, force_parallel);
        if workers == 0 {
            return Ok(TurboRun {
                result: init,
                workers_used: 0,
            });
        }

        let chunks = value_chunks(items, chunk_size);
        let results = self
            .run_chunks(TurboOp::Reduce, callable, chunks, Some(init.clone()))
            .await?;

        let mut accumulator = init;
        for result in results {
            let partial = match result {
                TurboChunkResult::Partial { value } => value,
                other => return Err(unexpected_chunk(&other)),
            };
            accumulator = self
                .apply_local(callable, vec![accumulator, partial])
                .await?;
        }
        Ok(TurboRun {
            result: accumulator,
            workers_used: workers,
        })
    }

    /// Typed fast path: map over a shared numeric buffer
    ///
    /// The input is shared with every worker by reference; the merged
    /// output is written at precomputed offsets, so nothing is copied per
    /// result on a channel transport.
    pub async fn map_f64(&self, callable: &Callable, input: Vec<f64>) -> TaskResult<Vec<f64>> {
        Ok(self.map_f64_run(callable, input, false).await?.result)
    }

    pub async fn map_f64_run(
        &self,
        callable: &Callable,
        input: Vec<f64>,
        force_parallel: bool,
    ) -> TaskResult<TurboRun<Vec<f64>>> {
        let n = input.len();
        let (workers, chunk_size) = self.plan(n, force_parallel);
        if workers == 0 {
            return Ok(TurboRun {
                result: Vec::new(),
                workers_used: 0,
            });
        }

        let buffer = Arc::new(input);
        let mut chunks = Vec::with_capacity(workers);
        let mut start = 0;
        while start < n {
            let end = (start + chunk_size).min(n);
            chunks.push(TurboPayload::Float64 {
                buffer: Arc::clone(&buffer),
                start,
                end,
            });
            start = end;
        }

        let results = self.run_chunks(TurboOp::Map, callable, chunks, None).await?;

        let mut out = vec![0.0; n];
        let mut offset = 0;
        for result in results {
            let items = match result {
                TurboChunkResult::Float64 { items } => items,
                other => return Err(unexpected_chunk(&other)),
            };
            out[offset..offset + items.len()].copy_from_slice(&items);
            offset += items.len();
        }
        Ok(TurboRun {
            result: out,
            workers_used: workers,
        })
    }

    /// Dispatch every chunk concurrently and collect results in chunk order
    async fn run_chunks(
        &self,
        op: TurboOp,
        callable: &Callable,
        chunks: Vec<TurboPayload>,
        init: Option<JsonValue>,
    ) -> TaskResult<Vec<TurboChunkResult>> {
        let fingerprint = callable.fingerprint();
        let aborted = Arc::new(AtomicBool::new(false));
        let first_error: Arc<Mutex<Option<TaskError>>> = Arc::new(Mutex::new(None));
        let expected = chunks.len();

        let chunk_futures = chunks.into_iter().enumerate().map(|(index, payload)| {
            let pool = self.pool.clone();
            let aborted = Arc::clone(&aborted);
            let first_error = Arc::clone(&first_error);
            let callable_name = callable.name.clone();
            let init = init.clone();

            async move {
                // Acquisitions race concurrently at high priority so turbo
                // chunks jump ahead of queued normal work.
                let acquisition = match pool
                    .acquire(PoolType::Normal, Priority::High, Some(fingerprint))
                    .await
                {
                    Ok(acquisition) => acquisition,
                    Err(error) => {
                        record_failure(&first_error, &aborted, error);
                        return None;
                    }
                };

                let worker = acquisition.worker.clone();
                let started = Instant::now();

                if aborted.load(Ordering::SeqCst) {
                    // A sibling already failed: hand the worker straight
                    // back, non-terminated.
                    pool.release(
                        PoolType::Normal,
                        Release {
                            entry_id: acquisition.entry_id,
                            worker,
                            temporary: acquisition.temporary,
                            execution_time: started.elapsed(),
                            failed: false,
                            fingerprint: Some(fingerprint),
                            force_terminated: false,
                        },
                    )
                    .await;
                    return None;
                }

                let correlation_id = Uuid::new_v4();
                let request = WorkerRequest::TurboChunk {
                    op,
                    callable: callable_name,
                    context: None,
                    payload,
                    init,
                    worker_index: index,
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
                    Ok(()) => loop {
                        tokio::select! {
                            message = replies.recv() => match message {
                                Some(envelope) => match envelope.message {
                                    WorkerReply::TurboComplete { result, items_processed, .. } => {
                                        debug!(chunk = index, items_processed, "turbo chunk complete");
                                        break (Ok(result), false);
                                    }
                                    WorkerReply::TurboError { error, .. } => {
                                        break (Err(TaskError::worker(error)), false);
                                    }
                                    WorkerReply::Log { level, args } => {
                                        forward_worker_log(worker.id(), &level, &args);
                                    }
                                    _ => {}
                                },
                                None => break (
                                    Err(TaskError::worker(WorkerErrorInfo::new(
                                        "WorkerExit",
                                        "worker channel closed before chunk reply",
                                    ))),
                                    true,
                                ),
                            },
                            code = worker.exited() => {
                                break (Err(TaskError::worker_exit(code)), true);
                            }
                        }
                    },
                };
                drop(replies);

                if force_terminated {
                    worker.terminate();
                }
                pool.release(
                    PoolType::Normal,
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

                match outcome {
                    Ok(result) => Some(result),
                    Err(error) => {
                        record_failure(&first_error, &aborted, error);
                        None
                    }
                }
            }
        });

        // join_all preserves input order, so slot i is chunk i.
        let slots = join_all(chunk_futures).await;
        if let Some(error) = first_error.lock().take() {
            return Err(error);
        }

        let mut results = Vec::with_capacity(expected);
        for slot in slots {
            match slot {
                Some(result) => results.push(result),
                None => {
                    return Err(TaskError::worker(WorkerErrorInfo::new(
                        "TurboAborted",
                        "chunk aborted before completion",
                    )))
                }
            }
        }
        Ok(results)
    }

    /// Apply the callable in-process, for the final reduce combine
    async fn apply_local(
        &self,
        callable: &Callable,
        args: Vec<JsonValue>,
    ) -> TaskResult<JsonValue> {
        let def = self.registry.get(&callable.name).ok_or_else(|| {
            TaskError::worker(WorkerErrorInfo::new(
                "UnknownCallable",
                format!("no callable registered under '{}'", callable.name),
            ))
        })?;
        match &def.handler {
            Handler::Unary(f) => {
                let (sink, _discard) = mpsc::channel(1);
                f(CallContext::new(args, None, sink))
                    .await
                    .map_err(TaskError::worker)
            }
            _ => Err(TaskError::worker(WorkerErrorInfo::new(
                "TypeError",
                "reduce combiner must be a unary callable",
            ))),
        }
    }
}

fn value_chunks(items: Vec<JsonValue>, chunk_size: usize) -> Vec<TurboPayload> {
    items
        .chunks(chunk_size.max(1))
        .map(|chunk| TurboPayload::Values {
            items: chunk.to_vec(),
        })
        .collect()
}

fn expect_values(result: TurboChunkResult) -> TaskResult<Vec<JsonValue>> {
    match result {
        TurboChunkResult::Values { items } => Ok(items),
        other => Err(unexpected_chunk(&other)),
    }
}

fn unexpected_chunk(result: &TurboChunkResult) -> TaskError {
    TaskError::worker(WorkerErrorInfo::new(
        "ProtocolError",
        format!("unexpected chunk result representation: {:?}", result),
    ))
}

fn record_failure(
    first_error: &Mutex<Option<TaskError>>,
    aborted: &AtomicBool,
    error: TaskError,
) {
    let mut guard = first_error.lock();
    if guard.is_none() {
        *guard = Some(error);
    }
    aborted.store(true, Ordering::SeqCst);
}
