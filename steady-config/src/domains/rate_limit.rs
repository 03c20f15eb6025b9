//! Sliding-window rate limit configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request ceilings for one quota domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Admissions allowed in any rolling 60 second window
    #[serde(alias = "requestsPerMinute")]
    pub requests_per_minute: u32,

    /// Admissions allowed in any rolling hour
    #[serde(alias = "requestsPerHour")]
    pub requests_per_hour: u32,

    /// Slack added to a computed wait so the oldest entry has really expired
    #[serde(with = "crate::domains::utils::serde_duration_ms", alias = "waitBuffer")]
    pub wait_buffer: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 50,
            requests_per_hour: 1000,
            wait_buffer: Duration::from_millis(100),
        }
    }
}

impl Validatable for RateLimitConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(
            self.requests_per_minute,
            "requests_per_minute",
            self.domain_name(),
        )?;
        validate_positive(self.requests_per_hour, "requests_per_hour", self.domain_name())?;

        if self.requests_per_hour < self.requests_per_minute {
            log::warn!(
                "requests_per_hour ({}) is below requests_per_minute ({}); the hour window will dominate",
                self.requests_per_hour,
                self.requests_per_minute
            );
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "rate_limit"
    }
}
