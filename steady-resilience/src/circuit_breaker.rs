//! Consecutive-exhaustion circuit breaker

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass through normally
    Closed,
    /// Calls are rejected without invoking the operation
    Open,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
        }
    }
}

/// Point-in-time view of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitStatus {
    pub circuit_open: bool,
    pub consecutive_failures: u32,
    /// When the next probe call will be let through; only set while open
    pub circuit_reset_time: Option<Instant>,
}

impl CircuitStatus {
    /// Time left until the reset time, zero once it has passed
    pub fn retry_in(&self) -> Option<Duration> {
        self.circuit_reset_time
            .map(|reset| reset.saturating_duration_since(Instant::now()))
    }
}

/// Circuit breaker counting retry-exhaustion events
///
/// The breaker opens after `threshold` consecutive exhaustion events and
/// stays open for `reset_delay`. There is no half-open state: the first
/// call made after the reset time closes the circuit and goes through as
/// an ordinary call.
#[derive(Clone)]
pub struct CircuitBreaker {
    threshold: u32,
    reset_delay: Duration,
    state: Arc<Mutex<CircuitBreakerState>>,
}

#[derive(Debug, Default)]
struct CircuitBreakerState {
    consecutive_failures: u32,
    /// `Some` exactly while the circuit is open
    reset_time: Option<Instant>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    pub fn new(threshold: u32, reset_delay: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            reset_delay,
            state: Arc::new(Mutex::new(CircuitBreakerState::default())),
        }
    }

    /// Ask to make a call
    ///
    /// Returns the remaining wait while the circuit is open. Once the reset
    /// time has passed the circuit closes, the failure count is cleared and
    /// the call is allowed.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let mut state = self.state.lock();

        if let Some(reset_time) = state.reset_time {
            let now = Instant::now();
            if now < reset_time {
                return Err(reset_time - now);
            }

            state.reset_time = None;
            state.consecutive_failures = 0;
            log::info!("Circuit breaker reset window elapsed, letting probe call through");
        }

        Ok(())
    }

    /// Record a successful call
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        state.consecutive_failures = 0;
    }

    /// Record a call that ran out of retries
    ///
    /// Every exhaustion at or over the threshold pushes the reset time out to
    /// `now + reset_delay`, including ones recorded while already open.
    /// Returns `true` if this event opened the circuit.
    pub fn record_exhaustion(&self) -> bool {
        let mut state = self.state.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);

        if state.consecutive_failures < self.threshold {
            return false;
        }

        let was_open = state.reset_time.is_some();
        state.reset_time = Some(Instant::now() + self.reset_delay);

        if was_open {
            log::debug!(
                "Circuit breaker still open after {} consecutive failures, retry in {:?}",
                state.consecutive_failures,
                self.reset_delay
            );
            return false;
        }

        log::warn!(
            "Circuit breaker opened after {} consecutive failures, retry in {:?}",
            state.consecutive_failures,
            self.reset_delay
        );
        true
    }

    /// Get the current state
    ///
    /// An open circuit whose reset time has passed still reports `Open`
    /// until the next call closes it.
    pub fn state(&self) -> CircuitState {
        if self.state.lock().reset_time.is_some() {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    /// Snapshot of the breaker's counters
    pub fn status(&self) -> CircuitStatus {
        let state = self.state.lock();
        CircuitStatus {
            circuit_open: state.reset_time.is_some(),
            consecutive_failures: state.consecutive_failures,
            circuit_reset_time: state.reset_time,
        }
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut state = self.state.lock();
        *state = CircuitBreakerState::default();
        log::debug!("Circuit breaker reset");
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("threshold", &self.threshold)
            .field("reset_delay", &self.reset_delay)
            .field("status", &self.status())
            .finish()
    }
}
