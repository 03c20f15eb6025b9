//! Domain-driven configuration management for steady
//!
//! Configuration is split into functional domains (retry, rate limiting,
//! logging), each with its own defaults, validation and environment
//! variable overrides.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    logging::LoggingConfig, rate_limit::RateLimitConfig, retry::RetryConfig, SteadyConfig,
};

// Re-export utilities
pub use domains::utils::serde_duration_ms;
