//! Domain-specific configuration modules

pub mod coalesce;
pub mod logging;
pub mod pool;
pub mod retry;
pub mod turbo;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main Turbine configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TurbineConfig {
    /// Worker pool configuration
    #[serde(default)]
    pub pool: pool::PoolConfig,

    /// Retry policy defaults
    #[serde(default)]
    pub retry: retry::RetryConfig,

    /// In-flight coalescing configuration
    #[serde(default)]
    pub coalesce: coalesce::CoalesceConfig,

    /// Parallel array processing configuration
    #[serde(default)]
    pub turbo: turbo::TurboConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl TurbineConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.pool.validate()?;
        self.retry.validate()?;
        self.coalesce.validate()?;
        self.turbo.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = Self::default();
        serde_yaml::to_string(&config).unwrap_or_default()
    }
}
