//! Worker pool configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of long-lived pooled workers per pool
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Workers kept alive through idle reclamation
    #[serde(default = "default_min_threads")]
    pub min_threads: usize,

    /// Maximum queued acquisitions per pool before QUEUE_FULL
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Overflow workers allowed beyond the pool, terminated on release
    #[serde(default = "default_max_temporary_workers")]
    pub max_temporary_workers: usize,

    /// Idle time after which a pooled worker above `min_threads` is reclaimed
    #[serde(with = "humantime_serde", default = "default_worker_idle_timeout")]
    pub worker_idle_timeout: Duration,

    /// Capacity of each worker's resolved-callable cache
    #[serde(default = "default_function_cache_size")]
    pub function_cache_size: usize,

    /// Skip affinity bookkeeping to keep per-worker memory flat
    #[serde(default = "crate::domains::utils::default_false")]
    pub low_memory_mode: bool,

    /// Opaque resource limits handed to the worker spawner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_limits: Option<JsonValue>,
}

fn default_pool_size() -> usize {
    num_cpus::get()
}

fn default_min_threads() -> usize {
    1
}

fn default_max_queue_size() -> usize {
    100
}

fn default_max_temporary_workers() -> usize {
    8
}

fn default_worker_idle_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_function_cache_size() -> usize {
    128
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            min_threads: default_min_threads(),
            max_queue_size: default_max_queue_size(),
            max_temporary_workers: default_max_temporary_workers(),
            worker_idle_timeout: default_worker_idle_timeout(),
            function_cache_size: default_function_cache_size(),
            low_memory_mode: false,
            resource_limits: None,
        }
    }
}

impl Validatable for PoolConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.pool_size, "pool_size", self.domain_name())?;
        validate_positive(self.max_queue_size, "max_queue_size", self.domain_name())?;
        validate_positive(
            self.worker_idle_timeout.as_millis(),
            "worker_idle_timeout",
            self.domain_name(),
        )?;
        validate_positive(
            self.function_cache_size,
            "function_cache_size",
            self.domain_name(),
        )?;

        if self.min_threads > self.pool_size {
            return Err(self.validation_error(format!(
                "min_threads ({}) cannot exceed pool_size ({})",
                self.min_threads, self.pool_size
            )));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "pool"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PoolConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.pool_size >= 1);
        assert_eq!(config.min_threads, 1);
    }

    #[test]
    fn test_min_threads_bound() {
        let config = PoolConfig {
            pool_size: 2,
            min_threads: 4,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_idle_timeout_parses_humantime() {
        let yaml = "worker_idle_timeout: 5s\npool_size: 2";
        let config: PoolConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.worker_idle_timeout, Duration::from_secs(5));
        assert_eq!(config.pool_size, 2);
    }
}
