//! Parallel array processing configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};

/// Parallel array processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TurboConfig {
    /// Minimum items per worker before an extra chunk is worth a dispatch
    #[serde(default = "default_min_items_per_worker")]
    pub min_items_per_worker: usize,

    /// Inputs below this length fall back to a single dispatch
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,

    /// Cap on chunk workers; defaults to the pool size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,
}

fn default_min_items_per_worker() -> usize {
    1000
}

fn default_parallel_threshold() -> usize {
    10_000
}

impl Default for TurboConfig {
    fn default() -> Self {
        Self {
            min_items_per_worker: default_min_items_per_worker(),
            parallel_threshold: default_parallel_threshold(),
            max_workers: None,
        }
    }
}

impl Validatable for TurboConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(
            self.min_items_per_worker,
            "min_items_per_worker",
            self.domain_name(),
        )?;

        if let Some(max_workers) = self.max_workers {
            validate_positive(max_workers, "max_workers", self.domain_name())?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "turbo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TurboConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_items_per_worker, 1000);
        assert_eq!(config.parallel_threshold, 10_000);
    }

    #[test]
    fn test_zero_max_workers_rejected() {
        let config = TurboConfig {
            max_workers: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
