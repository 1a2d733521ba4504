//! Retry policy defaults

use crate::error::ConfigResult;
use crate::validation::{validate_at_least, validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default retry policy applied when a task requests retries without
/// supplying its own policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(with = "humantime_serde", default = "default_base_delay")]
    pub base_delay: Duration,

    /// Upper bound on any computed delay
    #[serde(with = "humantime_serde", default = "default_max_delay")]
    pub max_delay: Duration,

    /// Multiplier applied per attempt
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_factor() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

impl Validatable for RetryConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.max_attempts, "max_attempts", self.domain_name())?;
        validate_positive(
            self.base_delay.as_millis(),
            "base_delay",
            self.domain_name(),
        )?;
        validate_at_least(
            self.backoff_factor,
            1.0,
            "backoff_factor",
            self.domain_name(),
        )?;

        if self.max_delay < self.base_delay {
            return Err(self.validation_error("max_delay cannot be below base_delay"));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "retry"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(RetryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_backoff_factor_below_one_rejected() {
        let config = RetryConfig {
            backoff_factor: 0.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_delay_bound() {
        let config = RetryConfig {
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(1),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
