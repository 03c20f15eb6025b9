//! Failure values flowing through the resilience layer

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use crate::classify::ErrorKind;

/// What the resilience layer needs to know about a failed operation
///
/// Classification only looks at the message text and an optional
/// HTTP-style status code. A server-supplied retry-after hint is used for
/// rate-limit failures when present.
pub trait FailureDetails {
    /// Human-readable failure message
    fn message(&self) -> Cow<'_, str>;

    /// HTTP-style status code, if the failure carries one
    fn status_code(&self) -> Option<u16> {
        None
    }

    /// Server-supplied hint for how long to wait before trying again
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Concrete failure of a protected operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationError {
    pub message: String,
    pub status: Option<u16>,
    pub retry_after: Option<Duration>,
}

impl OperationError {
    /// Create an error with only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            retry_after: None,
        }
    }

    /// Create an error carrying an HTTP-style status code
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self::new(message).status(status)
    }

    /// Set the status code
    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the retry-after hint
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {})", self.message, status),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for OperationError {}

impl FailureDetails for OperationError {
    fn message(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.message)
    }

    fn status_code(&self) -> Option<u16> {
        self.status
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

impl FailureDetails for std::io::Error {
    fn message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }
}

/// Outcome of a call that did not produce a value
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The circuit is open; the operation was not invoked
    #[error("circuit breaker open for {label}, retry in {}s", whole_seconds(.retry_in))]
    CircuitOpen { label: String, retry_in: Duration },

    /// The failure was classified as terminal and propagated on first sight
    #[error("{kind} error (not retried): {error}")]
    NonRetryable { kind: ErrorKind, error: E },

    /// Every attempt failed with a retryable error
    #[error("{kind} error after {attempts} attempts: {last_error}")]
    Exhausted {
        kind: ErrorKind,
        attempts: u32,
        last_error: E,
    },
}

impl<E> RetryError<E> {
    /// Get the underlying operation error if present
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::NonRetryable { error, .. } => Some(error),
            RetryError::Exhausted { last_error, .. } => Some(last_error),
            RetryError::CircuitOpen { .. } => None,
        }
    }

    /// Borrow the underlying operation error if present
    pub fn inner(&self) -> Option<&E> {
        match self {
            RetryError::NonRetryable { error, .. } => Some(error),
            RetryError::Exhausted { last_error, .. } => Some(last_error),
            RetryError::CircuitOpen { .. } => None,
        }
    }

    /// Check if this represents a circuit breaker rejection
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, RetryError::CircuitOpen { .. })
    }

    /// Classification of the underlying failure; `None` for circuit rejections
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            RetryError::NonRetryable { kind, .. } | RetryError::Exhausted { kind, .. } => {
                Some(*kind)
            }
            RetryError::CircuitOpen { .. } => None,
        }
    }

    /// Wait hint carried by a circuit rejection
    pub fn retry_in(&self) -> Option<Duration> {
        match self {
            RetryError::CircuitOpen { retry_in, .. } => Some(*retry_in),
            _ => None,
        }
    }
}

fn whole_seconds(duration: &Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_error_display() {
        assert_eq!(OperationError::new("boom").to_string(), "boom");
        assert_eq!(
            OperationError::with_status(503, "unavailable").to_string(),
            "unavailable (status 503)"
        );
    }

    #[test]
    fn test_circuit_open_message_rounds_up() {
        let err: RetryError<OperationError> = RetryError::CircuitOpen {
            label: "provider".to_string(),
            retry_in: Duration::from_millis(12_300),
        };
        assert_eq!(
            err.to_string(),
            "circuit breaker open for provider, retry in 13s"
        );
        assert!(err.is_circuit_open());
        assert_eq!(err.retry_in(), Some(Duration::from_millis(12_300)));
        assert!(err.kind().is_none());
        assert!(err.into_inner().is_none());
    }

    #[test]
    fn test_exhausted_keeps_last_error() {
        let err = RetryError::Exhausted {
            kind: ErrorKind::Network,
            attempts: 4,
            last_error: OperationError::new("ECONNRESET"),
        };
        assert_eq!(err.to_string(), "network error after 4 attempts: ECONNRESET");
        assert_eq!(err.kind(), Some(ErrorKind::Network));
        assert_eq!(err.into_inner().unwrap().message, "ECONNRESET");
    }

    #[test]
    fn test_io_error_details() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "network unreachable");
        assert_eq!(err.message(), "network unreachable");
        assert!(err.status_code().is_none());
    }
}
