//! Exponential backoff with injectable jitter

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;

/// Lower bound of the jitter factor (-25%)
pub const JITTER_MIN: f64 = 0.75;
/// Upper bound of the jitter factor (+25%)
pub const JITTER_MAX: f64 = 1.25;

/// Source of the random factor applied to every backoff delay
///
/// Implementations must return values in `[JITTER_MIN, JITTER_MAX]`.
pub trait JitterSource: Send + Sync {
    fn factor(&self) -> f64;
}

/// Uniform jitter from the thread-local RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn factor(&self) -> f64 {
        rand::thread_rng().gen_range(JITTER_MIN..=JITTER_MAX)
    }
}

/// Reproducible uniform jitter from a seeded RNG
pub struct SeededJitter {
    rng: Mutex<StdRng>,
}

impl SeededJitter {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl JitterSource for SeededJitter {
    fn factor(&self) -> f64 {
        self.rng.lock().gen_range(JITTER_MIN..=JITTER_MAX)
    }
}

/// Constant jitter factor, clamped into the allowed range
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(f64);

impl FixedJitter {
    pub fn new(factor: f64) -> Self {
        Self(factor.clamp(JITTER_MIN, JITTER_MAX))
    }

    /// No jitter at all
    pub fn none() -> Self {
        Self(1.0)
    }
}

impl JitterSource for FixedJitter {
    fn factor(&self) -> f64 {
        self.0
    }
}

/// Backoff delay calculator
///
/// `delay = min(max_delay, base_delay * multiplier^(attempt-1) * jitter)`,
/// floored to whole milliseconds. `attempt` is 1-indexed: the first retry
/// uses attempt 1.
#[derive(Clone)]
pub struct BackoffCalculator {
    base_delay: Duration,
    max_delay: Duration,
    jitter: Arc<dyn JitterSource>,
}

impl BackoffCalculator {
    /// Create a calculator using thread-local random jitter
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter: Arc::new(ThreadRngJitter),
        }
    }

    /// Replace the jitter source
    pub fn with_jitter<J>(mut self, jitter: J) -> Self
    where
        J: JitterSource + 'static,
    {
        self.jitter = Arc::new(jitter);
        self
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Calculate the delay before retry number `attempt`
    pub fn calculate_delay(&self, attempt: u32, multiplier: f64) -> Duration {
        self.delay_with_factor(attempt, multiplier, self.jitter.factor())
    }

    fn delay_with_factor(&self, attempt: u32, multiplier: f64, factor: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let raw_ms = self.base_delay.as_millis() as f64 * multiplier.powi(exponent) * factor;
        let max_ms = self.max_delay.as_millis() as f64;

        // f64::min drops NaN in favour of the cap
        let capped = raw_ms.min(max_ms).max(0.0);
        Duration::from_millis(capped.floor() as u64)
    }
}

impl std::fmt::Debug for BackoffCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackoffCalculator")
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish_non_exhaustive()
    }
}
