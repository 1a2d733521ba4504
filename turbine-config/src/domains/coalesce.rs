//! In-flight request coalescing configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};

/// Coalescing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoalesceConfig {
    /// Master switch for in-flight deduplication
    #[serde(default = "crate::domains::utils::default_true")]
    pub enabled: bool,

    /// Entries kept in the non-determinism decision cache before a half-clear
    #[serde(default = "default_pattern_cache_size")]
    pub pattern_cache_size: usize,
}

fn default_pattern_cache_size() -> usize {
    500
}

impl Default for CoalesceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pattern_cache_size: default_pattern_cache_size(),
        }
    }
}

impl Validatable for CoalesceConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(
            self.pattern_cache_size,
            "pattern_cache_size",
            self.domain_name(),
        )
    }

    fn domain_name(&self) -> &'static str {
        "coalesce"
    }
}
