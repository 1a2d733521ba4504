//! Task descriptors: what the engine executes

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::error::{TaskError, TaskResult};
use crate::keys;
use crate::retry::RetryPolicy;

/// Which worker pool a task runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PoolType {
    #[default]
    Normal,
    Generator,
}

impl PoolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolType::Normal => "normal",
            PoolType::Generator => "generator",
        }
    }
}

/// Scheduling priority band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    /// Parse a priority name, coercing anything unrecognized to `Normal`
    pub fn from_name(name: &str) -> Self {
        match name {
            "high" => Priority::High,
            "low" => Priority::Low,
            _ => Priority::Normal,
        }
    }
}

/// A callable addressed by registered name
///
/// The source text is carried only for fingerprinting and the coalescer's
/// non-determinism scan; dispatch resolves the name against the worker's
/// registry.
#[derive(Debug, Clone)]
pub struct Callable {
    pub name: String,
    pub source: String,
}

impl Callable {
    /// A callable whose registered name doubles as its source
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            source: name.clone(),
            name,
        }
    }

    /// Attach the source text used for fingerprinting and determinism checks
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn fingerprint(&self) -> u64 {
        keys::fingerprint(&self.source)
    }
}

/// Everything the engine needs to run one task
#[derive(Debug, Clone, Default)]
pub struct TaskDescriptor {
    pub callable: Callable,
    pub args: Vec<JsonValue>,
    /// Values injected into the callable's environment
    pub env: Option<Map<String, JsonValue>>,
    /// Values moved by ownership rather than copied
    pub transfer: Option<Vec<JsonValue>>,
    pub timeout: Option<Duration>,
    pub cancellation: Option<CancelToken>,
    pub priority: Priority,
    pub retry: Option<RetryPolicy>,
    /// Settle with a result wrapper instead of failing the future
    pub safe: bool,
    /// Opt this call out of in-flight coalescing
    pub no_coalesce: bool,
    pub pool_type: PoolType,
}

impl Default for Callable {
    fn default() -> Self {
        Callable::named("")
    }
}

impl TaskDescriptor {
    pub fn new(callable: Callable, args: Vec<JsonValue>) -> Self {
        Self {
            callable,
            args,
            ..Default::default()
        }
    }

    /// Reject malformed descriptors at the host boundary
    pub fn validate(&self) -> TaskResult<()> {
        if self.callable.name.is_empty() {
            return Err(TaskError::validation("callable", "non-empty registered name"));
        }
        if let Some(timeout) = self.timeout {
            if timeout.is_zero() {
                return Err(TaskError::validation("timeout", "positive finite duration"));
            }
        }
        if let Some(retry) = &self.retry {
            if retry.max_attempts == 0 {
                return Err(TaskError::validation("retry.max_attempts", "at least 1"));
            }
            if retry.backoff_factor < 1.0 {
                return Err(TaskError::validation("retry.backoff_factor", "at least 1.0"));
            }
        }
        Ok(())
    }
}
