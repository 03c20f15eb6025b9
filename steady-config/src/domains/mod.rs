//! Domain-specific configuration modules

pub mod logging;
pub mod rate_limit;
pub mod retry;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main steady configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SteadyConfig {
    /// Retry and circuit breaker configuration
    #[serde(default)]
    pub retry: retry::RetryConfig,

    /// Sliding-window rate limit configuration
    #[serde(default, alias = "rateLimit")]
    pub rate_limit: rate_limit::RateLimitConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl SteadyConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.retry.validate()?;
        self.rate_limit.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = SteadyConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
