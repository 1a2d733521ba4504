//! Callable registry: named handlers resolvable by workers

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use turbine_ipc::{MessageEnvelope, WorkerErrorInfo, WorkerReply};

/// Invocation context handed to a handler
pub struct CallContext {
    pub args: Vec<JsonValue>,
    /// Injected environment; empty when the caller supplied none
    pub env: Map<String, JsonValue>,
    log_tx: mpsc::Sender<MessageEnvelope<WorkerReply>>,
}

impl CallContext {
    pub(crate) fn new(
        args: Vec<JsonValue>,
        env: Option<Map<String, JsonValue>>,
        log_tx: mpsc::Sender<MessageEnvelope<WorkerReply>>,
    ) -> Self {
        Self {
            args,
            env: env.unwrap_or_default(),
            log_tx,
        }
    }

    /// Positional argument accessor
    pub fn arg(&self, index: usize) -> Option<&JsonValue> {
        self.args.get(index)
    }

    /// Environment value accessor
    pub fn env_value(&self, key: &str) -> Option<&JsonValue> {
        self.env.get(key)
    }

    /// Emit an out-of-band log line; never settles the task
    pub fn log(&self, level: &str, message: impl Into<String>) {
        let _ = self.log_tx.try_send(MessageEnvelope::new(WorkerReply::Log {
            level: level.to_string(),
            args: vec![message.into()],
        }));
    }
}

/// Yield channel handed to incremental producers
pub struct StreamEmitter {
    tx: mpsc::Sender<MessageEnvelope<WorkerReply>>,
    correlation_id: Uuid,
}

impl StreamEmitter {
    pub(crate) fn new(
        tx: mpsc::Sender<MessageEnvelope<WorkerReply>>,
        correlation_id: Uuid,
    ) -> Self {
        Self { tx, correlation_id }
    }

    /// Emit one value to the consumer; suspends when the reader is behind
    pub async fn yield_value(&self, value: JsonValue) -> Result<(), WorkerErrorInfo> {
        self.tx
            .send(MessageEnvelope::new(WorkerReply::Yield {
                correlation_id: self.correlation_id,
                value,
            }))
            .await
            .map_err(|_| WorkerErrorInfo::new("StreamClosed", "consumer went away"))
    }
}

type UnaryFn =
    Arc<dyn Fn(CallContext) -> BoxFuture<'static, Result<JsonValue, WorkerErrorInfo>> + Send + Sync>;
type ProducerFn = Arc<
    dyn Fn(CallContext, StreamEmitter) -> BoxFuture<'static, Result<Option<JsonValue>, WorkerErrorInfo>>
        + Send
        + Sync,
>;
type Float64Fn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// A registered handler
#[derive(Clone)]
pub enum Handler {
    /// One call, one result
    Unary(UnaryFn),
    /// Incremental producer; the optional return value is delivered after
    /// the final yield
    Producer(ProducerFn),
    /// Element function for the typed parallel fast path
    Float64(Float64Fn),
}

impl Handler {
    /// Wrap a synchronous function
    pub fn unary<F>(f: F) -> Self
    where
        F: Fn(CallContext) -> Result<JsonValue, WorkerErrorInfo> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Handler::Unary(Arc::new(move |ctx| {
            let f = Arc::clone(&f);
            async move { f(ctx) }.boxed()
        }))
    }

    /// Wrap an asynchronous function
    pub fn unary_async<F, Fut>(f: F) -> Self
    where
        F: Fn(CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<JsonValue, WorkerErrorInfo>> + Send + 'static,
    {
        let f = Arc::new(f);
        Handler::Unary(Arc::new(move |ctx| f(ctx).boxed()))
    }

    /// Wrap an incremental producer
    pub fn producer<F, Fut>(f: F) -> Self
    where
        F: Fn(CallContext, StreamEmitter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<JsonValue>, WorkerErrorInfo>> + Send + 'static,
    {
        let f = Arc::new(f);
        Handler::Producer(Arc::new(move |ctx, emitter| f(ctx, emitter).boxed()))
    }

    /// Wrap a typed element function
    pub fn float64<F>(f: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Handler::Float64(Arc::new(f))
    }
}

/// A registered callable: handler plus the source text used for
/// fingerprinting and determinism checks
#[derive(Clone)]
pub struct CallableDef {
    pub source: String,
    pub handler: Handler,
}

/// Shared name → handler table
///
/// The registry is the host-side stand-in for shipping callable source to a
/// sandboxed worker; each worker resolves names against it through a bounded
/// per-worker cache.
#[derive(Default)]
pub struct CallableRegistry {
    entries: RwLock<HashMap<String, Arc<CallableDef>>>,
}

impl CallableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a name, replacing any previous entry
    pub fn register(&self, name: impl Into<String>, source: impl Into<String>, handler: Handler) {
        self.entries.write().insert(
            name.into(),
            Arc::new(CallableDef {
                source: source.into(),
                handler,
            }),
        );
    }

    pub fn get(&self, name: &str) -> Option<Arc<CallableDef>> {
        self.entries.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
