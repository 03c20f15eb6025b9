//! Resilience layer for steady
//!
//! This crate protects repeated calls to an unreliable remote operation:
//! failures are classified, retried with jittered exponential backoff, and
//! counted by a circuit breaker, while a dual-window rate limiter keeps the
//! call rate inside a per-minute and per-hour quota.
//!
//! The two halves share no state. A caller typically composes them:
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use steady_resilience::{OperationError, RateLimiter, RetryController};
//!
//! let limiter = RateLimiter::with_defaults();
//! let controller = RetryController::with_defaults();
//!
//! let reply = controller
//!     .execute("provider", || {
//!         let limiter = limiter.clone();
//!         async move {
//!             limiter.admit().await;
//!             Ok::<_, OperationError>("pong")
//!         }
//!     })
//!     .await?;
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod error;

#[cfg(feature = "retry")]
pub mod backoff;
#[cfg(feature = "retry")]
pub mod circuit_breaker;
#[cfg(feature = "retry")]
pub mod retry;

#[cfg(feature = "rate-limit")]
pub mod rate_limiter;

// Re-export commonly used types
pub use classify::{classify, classify_failure, ErrorClassification, ErrorKind};
pub use error::{FailureDetails, OperationError, RetryError};

#[cfg(feature = "retry")]
pub use backoff::{BackoffCalculator, FixedJitter, JitterSource, SeededJitter, ThreadRngJitter};
#[cfg(feature = "retry")]
pub use circuit_breaker::{CircuitBreaker, CircuitState, CircuitStatus};
#[cfg(feature = "retry")]
pub use retry::RetryController;

#[cfg(feature = "rate-limit")]
pub use rate_limiter::{RateLimitUsage, RateLimited, RateLimiter, Window};

pub use steady_config::{RateLimitConfig, RetryConfig};
