//! Turbine execution engine
//!
//! A worker-pool task execution engine for user-supplied compute jobs:
//! affinity-aware worker selection, three-band priority queueing, per-task
//! timeout and cancellation, retry with jittered exponential backoff,
//! in-flight request coalescing, an incremental producer protocol, and a
//! parallel map/filter/reduce layer.

pub mod backoff;
pub mod cancel;
pub mod coalesce;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod executor;
pub mod keys;
pub mod metrics;
pub mod pool;
pub mod queue;
pub mod registry;
pub mod retry;
pub mod stream;
pub mod turbo;
pub mod worker;

pub use cancel::CancelToken;
pub use coalesce::{Coalescer, CoalescerSnapshot};
pub use descriptor::{Callable, PoolType, Priority, TaskDescriptor};
pub use engine::TaskEngine;
pub use error::{SettledResult, TaskError, TaskResult};
pub use executor::{TaskExecutor, Turbine};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use pool::{Acquisition, PoolManager, PoolStats, Release, WorkerStatsEntry};
pub use registry::{CallContext, CallableDef, CallableRegistry, Handler, StreamEmitter};
pub use retry::{RetryController, RetryPolicy};
pub use stream::{StreamEngine, TaskStream};
pub use turbo::{Turbo, TurboRun};
pub use worker::{TaskWorkerSpawner, WorkerHandle, WorkerSpawner};
