//! Configuration loading and environment variable handling

use crate::domains::TurbineConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with the default prefix
    pub fn new() -> Self {
        Self {
            prefix: "TURBINE".to_string(),
        }
    }

    /// Create a new config loader with a custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<TurbineConfig> {
        let content = std::fs::read_to_string(path)?;
        let mut config: TurbineConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<TurbineConfig> {
        let mut config = TurbineConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<TurbineConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut TurbineConfig) -> ConfigResult<()> {
        if let Some(pool_size) = self.parse_env::<usize>("POOL_SIZE")? {
            config.pool.pool_size = pool_size;
        }
        if let Some(min_threads) = self.parse_env::<usize>("MIN_THREADS")? {
            config.pool.min_threads = min_threads;
        }
        if let Some(max_queue) = self.parse_env::<usize>("MAX_QUEUE_SIZE")? {
            config.pool.max_queue_size = max_queue;
        }
        if let Some(max_temp) = self.parse_env::<usize>("MAX_TEMPORARY_WORKERS")? {
            config.pool.max_temporary_workers = max_temp;
        }
        if let Some(idle_secs) = self.parse_env::<u64>("WORKER_IDLE_TIMEOUT_SECONDS")? {
            config.pool.worker_idle_timeout = Duration::from_secs(idle_secs);
        }
        if let Some(low_memory) = self.parse_env::<bool>("LOW_MEMORY_MODE")? {
            config.pool.low_memory_mode = low_memory;
        }
        if let Some(enabled) = self.parse_env::<bool>("COALESCE_ENABLED")? {
            config.coalesce.enabled = enabled;
        }
        if let Some(max_attempts) = self.parse_env::<u32>("RETRY_MAX_ATTEMPTS")? {
            config.retry.max_attempts = max_attempts;
        }
        if let Some(threshold) = self.parse_env::<usize>("TURBO_PARALLEL_THRESHOLD")? {
            config.turbo.parallel_threshold = threshold;
        }
        Ok(())
    }

    fn parse_env<T: FromStr>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T::Err: std::fmt::Display,
    {
        let key = format!("{}_{}", self.prefix, name);
        match std::env::var(&key) {
            Ok(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|e| ConfigError::EnvError(format!("Invalid {}: {}", key, e))),
            Err(_) => Ok(None),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
