//! Turbine configuration
//!
//! Domain-split configuration with validation, YAML loading, and
//! environment variable overrides.

pub mod domains;
pub mod error;
pub mod loader;
pub mod validation;

pub use domains::coalesce::CoalesceConfig;
pub use domains::logging::{LogFormat, LogLevel, LoggingConfig};
pub use domains::pool::PoolConfig;
pub use domains::retry::RetryConfig;
pub use domains::turbo::TurboConfig;
pub use domains::TurbineConfig;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;
