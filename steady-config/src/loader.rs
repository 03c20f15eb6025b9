//! Configuration loading and environment variable handling

use crate::domains::SteadyConfig;
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
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "STEADY".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML (or `.json`) file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<SteadyConfig> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadError {
                path: path.to_path_buf(),
                source,
            })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let mut config: SteadyConfig = if is_json {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<SteadyConfig> {
        let mut config = SteadyConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<SteadyConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut SteadyConfig) -> ConfigResult<()> {
        self.apply_retry_overrides(&mut config.retry)?;
        self.apply_rate_limit_overrides(&mut config.rate_limit)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    /// Apply retry config overrides
    fn apply_retry_overrides(
        &self,
        config: &mut crate::domains::retry::RetryConfig,
    ) -> ConfigResult<()> {
        if let Some(max_retries) = self.parse_env_var("MAX_RETRIES")? {
            config.max_retries = max_retries;
        }

        if let Some(millis) = self.parse_env_var::<u64>("BASE_DELAY_MS")? {
            config.base_delay = Duration::from_millis(millis);
        }

        if let Some(millis) = self.parse_env_var::<u64>("MAX_DELAY_MS")? {
            config.max_delay = Duration::from_millis(millis);
        }

        if let Some(threshold) = self.parse_env_var("CIRCUIT_BREAKER_THRESHOLD")? {
            config.circuit_breaker_threshold = threshold;
        }

        if let Some(millis) = self.parse_env_var::<u64>("CIRCUIT_RESET_DELAY_MS")? {
            config.circuit_reset_delay = Duration::from_millis(millis);
        }

        if let Some(verbose) = self.parse_env_var("VERBOSE")? {
            config.verbose = verbose;
        }

        Ok(())
    }

    /// Apply rate limit config overrides
    fn apply_rate_limit_overrides(
        &self,
        config: &mut crate::domains::rate_limit::RateLimitConfig,
    ) -> ConfigResult<()> {
        if let Some(rpm) = self.parse_env_var("REQUESTS_PER_MINUTE")? {
            config.requests_per_minute = rpm;
        }

        if let Some(rph) = self.parse_env_var("REQUESTS_PER_HOUR")? {
            config.requests_per_hour = rph;
        }

        Ok(())
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Some(level) = self.parse_env_var("LOG_LEVEL")? {
            config.level = level;
        }

        if let Some(format) = self.parse_env_var("LOG_FORMAT")? {
            config.format = format;
        }

        Ok(())
    }

    /// Parse an optional prefixed environment variable
    fn parse_env_var<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_env_var(name) {
            Ok(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| ConfigError::EnvError {
                    var: self.env_key(name),
                    value: raw.clone(),
                    reason: e.to_string(),
                }),
            Err(_) => Ok(None),
        }
    }

    fn env_key(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name)
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(self.env_key(name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
