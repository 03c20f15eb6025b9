//! Retry and circuit breaker configuration

use crate::error::ConfigResult;
use crate::validation::{validate_ordered, validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy and circuit breaker settings for one protected resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retry attempts after the first invocation
    #[serde(alias = "maxRetries")]
    pub max_retries: u32,

    /// Backoff base delay
    #[serde(with = "crate::domains::utils::serde_duration_ms", alias = "baseDelay")]
    pub base_delay: Duration,

    /// Upper bound for any single backoff delay
    #[serde(with = "crate::domains::utils::serde_duration_ms", alias = "maxDelay")]
    pub max_delay: Duration,

    /// Consecutive retry-exhaustion events before the circuit opens
    #[serde(alias = "circuitBreakerThreshold")]
    pub circuit_breaker_threshold: u32,

    /// How long the circuit stays open before a probe call is let through
    #[serde(
        with = "crate::domains::utils::serde_duration_ms",
        alias = "circuitResetDelay"
    )]
    pub circuit_reset_delay: Duration,

    /// Emit per-attempt diagnostics at info level
    #[serde(default = "crate::domains::utils::default_false")]
    pub verbose: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            circuit_breaker_threshold: 5,
            circuit_reset_delay: Duration::from_millis(60_000),
            verbose: false,
        }
    }
}

impl RetryConfig {
    /// Total operation invocations a single call may perform
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Validatable for RetryConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(
            self.circuit_breaker_threshold,
            "circuit_breaker_threshold",
            self.domain_name(),
        )?;

        validate_ordered(
            self.base_delay,
            self.max_delay,
            "base_delay",
            "max_delay",
            self.domain_name(),
        )?;

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "retry"
    }
}
