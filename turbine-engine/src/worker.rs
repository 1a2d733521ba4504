//! Worker runtime and process handles
//!
//! Each worker is an isolated executor behind a message channel; the host
//! only observes the Worker Protocol and an exit signal. The built-in
//! spawner runs workers as dedicated tasks resolving callables against the
//! shared registry through a bounded per-worker function cache.

use futures::FutureExt;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use turbine_ipc::{
    channel, IpcError, MessageEnvelope, TurboChunkResult, TurboOp, TurboPayload, WorkerEndpoint,
    WorkerErrorInfo, WorkerReply, WorkerRequest,
};

use crate::descriptor::PoolType;
use crate::error::{TaskError, TaskResult};
use crate::registry::{CallContext, CallableDef, CallableRegistry, Handler, StreamEmitter};

/// Message channel depth per direction; a full reply channel suspends the
/// producer, giving streams their backpressure.
const CHANNEL_CAPACITY: usize = 64;

type ReplyReceiver = mpsc::Receiver<MessageEnvelope<WorkerReply>>;

/// Cloneable handle to a running worker
#[derive(Clone)]
pub struct WorkerHandle {
    id: Arc<str>,
    requests: mpsc::Sender<MessageEnvelope<WorkerRequest>>,
    replies: Arc<Mutex<ReplyReceiver>>,
    exit: watch::Receiver<Option<i32>>,
    abort: tokio::task::AbortHandle,
    terminated: Arc<AtomicBool>,
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("terminated", &self.terminated.load(Ordering::Relaxed))
            .finish()
    }
}

impl WorkerHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Dispatch a request message to the worker
    pub async fn send(&self, request: WorkerRequest) -> Result<(), IpcError> {
        self.requests
            .send(MessageEnvelope::new(request))
            .await
            .map_err(|_| IpcError::ChannelClosed)
    }

    /// Exclusive access to the reply channel
    ///
    /// At most one task runs per worker at a time, so the receiver is held
    /// by exactly one dispatcher for the duration of an execution.
    pub fn replies(&self) -> Arc<Mutex<ReplyReceiver>> {
        Arc::clone(&self.replies)
    }

    /// Watch channel carrying the exit code once the worker is gone
    pub fn exit_receiver(&self) -> watch::Receiver<Option<i32>> {
        self.exit.clone()
    }

    /// Resolve with the worker's exit code
    pub async fn exited(&self) -> i32 {
        let mut rx = self.exit.clone();
        loop {
            if let Some(code) = *rx.borrow_and_update() {
                return code;
            }
            if rx.changed().await.is_err() {
                return 1;
            }
        }
    }

    /// Hard stop: any in-flight work is lost
    pub fn terminate(&self) {
        if !self.terminated.swap(true, Ordering::SeqCst) {
            debug!(worker_id = %self.id, "terminating worker");
            self.abort.abort();
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}

/// Creates workers for the pool manager
///
/// Spawning is synchronous so pool bookkeeping can hold its guard across
/// the call; the worker itself starts up concurrently.
pub trait WorkerSpawner: Send + Sync {
    fn spawn(&self, pool_type: PoolType) -> TaskResult<WorkerHandle>;
}

/// Built-in spawner running workers as dedicated tasks
pub struct TaskWorkerSpawner {
    registry: Arc<CallableRegistry>,
    function_cache_size: usize,
    counter: AtomicU64,
}

impl TaskWorkerSpawner {
    pub fn new(registry: Arc<CallableRegistry>, function_cache_size: usize) -> Self {
        Self {
            registry,
            function_cache_size,
            counter: AtomicU64::new(0),
        }
    }
}

impl WorkerSpawner for TaskWorkerSpawner {
    fn spawn(&self, pool_type: PoolType) -> TaskResult<WorkerHandle> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let worker_id = format!("{}-worker-{}", pool_type.as_str(), n);

        let (host, worker) = channel(CHANNEL_CAPACITY);
        let (requests, replies) = host.into_parts();
        let (exit_tx, exit_rx) = watch::channel(None);

        let registry = Arc::clone(&self.registry);
        let cache_size = self.function_cache_size;
        let id_for_task = worker_id.clone();
        let join = tokio::spawn(async move {
            worker_main(worker, registry, cache_size, id_for_task).await;
        });
        let abort = join.abort_handle();

        // Publish the exit code exactly once, however the worker ends.
        tokio::spawn(async move {
            let code = match join.await {
                Ok(()) => 0,
                Err(e) if e.is_cancelled() => 0,
                Err(_) => 1,
            };
            let _ = exit_tx.send(Some(code));
        });

        debug!(worker_id = %worker_id, pool = pool_type.as_str(), "spawned worker");

        Ok(WorkerHandle {
            id: worker_id.into(),
            requests,
            replies: Arc::new(Mutex::new(replies)),
            exit: exit_rx,
            abort,
            terminated: Arc::new(AtomicBool::new(false)),
        })
    }
}

/// Bounded resolved-callable cache owned by one worker
struct FunctionCache {
    capacity: usize,
    entries: HashMap<String, Arc<CallableDef>>,
}

impl FunctionCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
        }
    }

    fn resolve(&mut self, registry: &CallableRegistry, name: &str) -> Option<Arc<CallableDef>> {
        if let Some(def) = self.entries.get(name) {
            return Some(Arc::clone(def));
        }
        let def = registry.get(name)?;
        // Retention is best-effort; reset wholesale at capacity.
        if self.entries.len() >= self.capacity {
            self.entries.clear();
        }
        self.entries.insert(name.to_string(), Arc::clone(&def));
        Some(def)
    }
}

/// Worker event loop: one request at a time, strictly request→reply
async fn worker_main(
    mut endpoint: WorkerEndpoint,
    registry: Arc<CallableRegistry>,
    cache_size: usize,
    worker_id: String,
) {
    let mut cache = FunctionCache::new(cache_size);

    loop {
        let envelope = match endpoint.recv().await {
            Ok(envelope) => envelope,
            Err(IpcError::ChannelClosed) => break,
            Err(e) => {
                warn!(worker_id = %worker_id, error = %e, "dropping bad message");
                continue;
            }
        };

        let reply = match envelope.message {
            WorkerRequest::Execute {
                callable,
                args,
                context,
                correlation_id,
                ..
            } => {
                let outcome = match cache.resolve(&registry, &callable) {
                    Some(def) => {
                        invoke_unary(&def, CallContext::new(args, context, endpoint.sender()))
                            .await
                    }
                    None => Err(unknown_callable(&callable)),
                };
                match outcome {
                    Ok(value) => WorkerReply::Completed {
                        correlation_id,
                        value,
                    },
                    Err(error) => WorkerReply::Failed {
                        correlation_id,
                        error,
                    },
                }
            }

            WorkerRequest::ExecuteStream {
                callable,
                args,
                context,
                correlation_id,
            } => {
                run_stream(
                    &mut cache,
                    &registry,
                    &endpoint,
                    callable,
                    args,
                    context,
                    correlation_id,
                )
                .await
            }

            WorkerRequest::TurboChunk {
                op,
                callable,
                context,
                payload,
                init,
                worker_index,
                correlation_id,
            } => {
                let outcome = match cache.resolve(&registry, &callable) {
                    Some(def) => {
                        run_turbo_chunk(&def, op, payload, init, context, &endpoint).await
                    }
                    None => Err(unknown_callable(&callable)),
                };
                match outcome {
                    Ok((result, items_processed)) => WorkerReply::TurboComplete {
                        correlation_id,
                        worker_index,
                        result,
                        items_processed,
                    },
                    Err(error) => WorkerReply::TurboError {
                        correlation_id,
                        worker_index,
                        error,
                    },
                }
            }

            WorkerRequest::Shutdown => break,
        };

        if endpoint.send(reply).await.is_err() {
            break;
        }
    }

    debug!(worker_id = %worker_id, "worker loop ended");
}

/// Invoke a single-result handler, converting panics into failure replies
async fn invoke_unary(
    def: &CallableDef,
    ctx: CallContext,
) -> Result<JsonValue, WorkerErrorInfo> {
    match &def.handler {
        Handler::Unary(f) => match AssertUnwindSafe(f(ctx)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => Err(panic_error(panic)),
        },
        Handler::Float64(f) => {
            let x = ctx
                .arg(0)
                .and_then(JsonValue::as_f64)
                .ok_or_else(|| WorkerErrorInfo::new("TypeError", "expected a numeric argument"))?;
            Ok(JsonValue::from(f(x)))
        }
        Handler::Producer(_) => Err(WorkerErrorInfo::new(
            "TypeError",
            "callable is an incremental producer; dispatch it on the generator pool",
        )),
    }
}

/// Drive an incremental producer to completion
async fn run_stream(
    cache: &mut FunctionCache,
    registry: &CallableRegistry,
    endpoint: &WorkerEndpoint,
    callable: String,
    args: Vec<JsonValue>,
    context: Option<Map<String, JsonValue>>,
    correlation_id: Uuid,
) -> WorkerReply {
    let Some(def) = cache.resolve(registry, &callable) else {
        return WorkerReply::Failed {
            correlation_id,
            error: unknown_callable(&callable),
        };
    };

    let Handler::Producer(f) = &def.handler else {
        return WorkerReply::Failed {
            correlation_id,
            error: WorkerErrorInfo::new(
                "TypeError",
                "callable does not produce an incremental sequence",
            ),
        };
    };

    let ctx = CallContext::new(args, context, endpoint.sender());
    let emitter = StreamEmitter::new(endpoint.sender(), correlation_id);

    match AssertUnwindSafe(f(ctx, emitter)).catch_unwind().await {
        Ok(Ok(return_value)) => {
            if let Some(value) = return_value {
                let sent = endpoint
                    .send(WorkerReply::Return {
                        correlation_id,
                        value,
                    })
                    .await;
                if sent.is_err() {
                    return WorkerReply::End { correlation_id };
                }
            }
            WorkerReply::End { correlation_id }
        }
        Ok(Err(error)) => WorkerReply::Failed {
            correlation_id,
            error,
        },
        Err(panic) => WorkerReply::Failed {
            correlation_id,
            error: panic_error(panic),
        },
    }
}

/// Execute one chunk of a parallel array operation
async fn run_turbo_chunk(
    def: &CallableDef,
    op: TurboOp,
    payload: TurboPayload,
    init: Option<JsonValue>,
    context: Option<Map<String, JsonValue>>,
    endpoint: &WorkerEndpoint,
) -> Result<(TurboChunkResult, usize), WorkerErrorInfo> {
    match payload {
        TurboPayload::Values { items } => {
            let count = items.len();
            match op {
                TurboOp::Map => {
                    let mut out = Vec::with_capacity(count);
                    for item in items {
                        let ctx =
                            CallContext::new(vec![item], context.clone(), endpoint.sender());
                        out.push(invoke_unary(def, ctx).await?);
                    }
                    Ok((TurboChunkResult::Values { items: out }, count))
                }
                TurboOp::Filter => {
                    let mut out = Vec::new();
                    for item in items {
                        let ctx = CallContext::new(
                            vec![item.clone()],
                            context.clone(),
                            endpoint.sender(),
                        );
                        if truthy(&invoke_unary(def, ctx).await?) {
                            out.push(item);
                        }
                    }
                    Ok((TurboChunkResult::Values { items: out }, count))
                }
                TurboOp::Reduce => {
                    let mut acc = init.unwrap_or(JsonValue::Null);
                    for item in items {
                        let ctx = CallContext::new(
                            vec![acc, item],
                            context.clone(),
                            endpoint.sender(),
                        );
                        acc = invoke_unary(def, ctx).await?;
                    }
                    Ok((TurboChunkResult::Partial { value: acc }, count))
                }
            }
        }

        TurboPayload::Float64 { buffer, start, end } => {
            if op != TurboOp::Map {
                return Err(WorkerErrorInfo::new(
                    "TypeError",
                    "typed buffers support map only",
                ));
            }
            let slice = buffer
                .get(start..end)
                .ok_or_else(|| WorkerErrorInfo::new("RangeError", "chunk out of bounds"))?;
            let count = slice.len();

            match &def.handler {
                Handler::Float64(f) => {
                    let out: Vec<f64> = slice.iter().copied().map(|x| f(x)).collect();
                    Ok((TurboChunkResult::Float64 { items: out }, count))
                }
                _ => {
                    // Untyped handler over a typed buffer: go through JSON
                    // per element.
                    let mut out = Vec::with_capacity(count);
                    for &x in slice {
                        let ctx = CallContext::new(
                            vec![JsonValue::from(x)],
                            context.clone(),
                            endpoint.sender(),
                        );
                        let value = invoke_unary(def, ctx).await?;
                        let y = value.as_f64().ok_or_else(|| {
                            WorkerErrorInfo::new("TypeError", "map result is not numeric")
                        })?;
                        out.push(y);
                    }
                    Ok((TurboChunkResult::Float64 { items: out }, count))
                }
            }
        }
    }
}

/// Predicate truthiness for filter results
pub(crate) fn truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().map(|x| x != 0.0).unwrap_or(true),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}

fn unknown_callable(name: &str) -> WorkerErrorInfo {
    WorkerErrorInfo::new(
        "UnknownCallable",
        format!("no callable registered under '{}'", name),
    )
}

fn panic_error(panic: Box<dyn std::any::Any + Send>) -> WorkerErrorInfo {
    let message = if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker handler panicked".to_string()
    };
    WorkerErrorInfo::new("Panic", message)
}
