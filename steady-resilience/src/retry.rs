//! Retry controller with circuit breaker

use log::{info, warn, Level};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use steady_config::RetryConfig;

use crate::backoff::{BackoffCalculator, JitterSource};
use crate::circuit_breaker::{CircuitBreaker, CircuitState, CircuitStatus};
use crate::classify::{classify_failure, ErrorClassification};
use crate::error::{FailureDetails, RetryError};

/// Guards one protected resource
///
/// Each call gets up to `max_retries + 1` invocations. Terminal failures
/// propagate immediately; retryable ones back off with jitter until the
/// budget runs out, at which point the exhaustion is counted by the circuit
/// breaker. Cloning yields another handle to the same breaker state.
#[derive(Clone)]
pub struct RetryController {
    config: Arc<RetryConfig>,
    backoff: BackoffCalculator,
    breaker: CircuitBreaker,
}

impl RetryController {
    /// Create a new controller from the given configuration
    pub fn new(config: RetryConfig) -> Self {
        let backoff = BackoffCalculator::new(config.base_delay, config.max_delay);
        let breaker =
            CircuitBreaker::new(config.circuit_breaker_threshold, config.circuit_reset_delay);

        Self {
            config: Arc::new(config),
            backoff,
            breaker,
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Replace the jitter source used for backoff
    pub fn with_jitter<J>(mut self, jitter: J) -> Self
    where
        J: JitterSource + 'static,
    {
        self.backoff = self.backoff.with_jitter(jitter);
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation with retry and circuit breaker protection
    pub async fn execute<F, Fut, T, E>(
        &self,
        label: &str,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: FailureDetails + Display,
    {
        self.execute_with_context(label, |_attempt| operation()).await
    }

    /// Execute an operation that receives the 1-indexed attempt number
    pub async fn execute_with_context<F, Fut, T, E>(
        &self,
        label: &str,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: FailureDetails + Display,
    {
        if let Err(retry_in) = self.breaker.try_acquire() {
            warn!("[{}] Circuit breaker open, rejecting call for {:?}", label, retry_in);
            return Err(RetryError::CircuitOpen {
                label: label.to_string(),
                retry_in,
            });
        }

        let max_attempts = self.config.max_attempts();
        let mut attempt = 1;

        loop {
            log::log!(
                self.diagnostic_level(),
                "[{}] Executing attempt {} of {}",
                label,
                attempt,
                max_attempts
            );

            match operation(attempt).await {
                Ok(result) => {
                    if attempt > 1 {
                        info!("[{}] Operation succeeded after {} attempts", label, attempt);
                    }
                    self.breaker.record_success();
                    return Ok(result);
                }
                Err(error) => {
                    let classification = classify_failure(&error);

                    if !classification.retryable {
                        warn!(
                            "[{}] Operation failed with non-retryable {} error: {}",
                            label, classification.kind, error
                        );
                        return Err(RetryError::NonRetryable {
                            kind: classification.kind,
                            error,
                        });
                    }

                    if attempt >= max_attempts {
                        warn!(
                            "[{}] Operation failed after {} attempts: {}",
                            label, attempt, error
                        );
                        self.breaker.record_exhaustion();
                        return Err(RetryError::Exhausted {
                            kind: classification.kind,
                            attempts: attempt,
                            last_error: error,
                        });
                    }

                    // The n-th retry backs off with exponent n-1
                    let delay = self.retry_delay(attempt, &classification, &error);
                    warn!(
                        "[{}] Attempt {} failed ({}): {}. Retrying in {:?}",
                        label, attempt, classification.kind, error, delay
                    );
                    sleep(delay).await;

                    attempt += 1;
                }
            }
        }
    }

    /// Wait before retry number `retry`
    fn retry_delay<E>(
        &self,
        retry: u32,
        classification: &ErrorClassification,
        error: &E,
    ) -> Duration
    where
        E: FailureDetails,
    {
        if classification.use_retry_after {
            if let Some(hint) = error.retry_after() {
                log::log!(
                    self.diagnostic_level(),
                    "Using server retry-after hint of {:?}",
                    hint
                );
                return hint.min(self.backoff.max_delay());
            }
        }

        self.backoff
            .calculate_delay(retry, classification.backoff_multiplier)
    }

    fn diagnostic_level(&self) -> Level {
        if self.config.verbose {
            Level::Info
        } else {
            Level::Debug
        }
    }

    /// Current circuit state
    pub fn state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Snapshot of the circuit breaker counters
    pub fn status(&self) -> CircuitStatus {
        self.breaker.status()
    }

    /// Clear all circuit breaker state
    pub fn reset(&self) {
        self.breaker.reset();
    }
}

impl std::fmt::Debug for RetryController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryController")
            .field("config", &self.config)
            .field("breaker", &self.breaker)
            .finish()
    }
}
