//! Failure classification
//!
//! Maps a failed operation onto an [`ErrorKind`] and decides whether it is
//! worth retrying and how hard to back off. Rules are checked in order and
//! the first match wins; message matching is a case-insensitive substring
//! search.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FailureDetails;

const NETWORK_PATTERNS: &[&str] = &[
    "econnreset",
    "connection reset",
    "enotfound",
    "host not found",
    "etimedout",
    "timed out",
    "network",
    "timeout",
];

const RATE_LIMIT_PATTERNS: &[&str] = &["rate limit", "too many requests"];

const AUTH_PATTERNS: &[&str] = &["unauthorized", "forbidden", "api key"];

const VALIDATION_PATTERNS: &[&str] = &["invalid", "validation"];

/// Failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    RateLimit,
    ServerError,
    Auth,
    Validation,
    ClientError,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::ServerError => "server_error",
            ErrorKind::Auth => "auth",
            ErrorKind::Validation => "validation",
            ErrorKind::ClientError => "client_error",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retry decision for a single failure
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub kind: ErrorKind,
    pub retryable: bool,
    /// Base of the exponential backoff for this kind of failure
    pub backoff_multiplier: f64,
    /// Prefer a server-supplied retry-after hint over computed backoff
    pub use_retry_after: bool,
}

impl ErrorClassification {
    const fn retryable(kind: ErrorKind, backoff_multiplier: f64) -> Self {
        Self {
            kind,
            retryable: true,
            backoff_multiplier,
            use_retry_after: false,
        }
    }

    const fn terminal(kind: ErrorKind) -> Self {
        Self {
            kind,
            retryable: false,
            backoff_multiplier: 1.0,
            use_retry_after: false,
        }
    }
}

/// Classify a failure from its message and optional status code
pub fn classify(message: &str, status: Option<u16>) -> ErrorClassification {
    let message = message.to_lowercase();
    let mentions = |patterns: &[&str]| patterns.iter().any(|p| message.contains(p));

    if mentions(NETWORK_PATTERNS) {
        return ErrorClassification::retryable(ErrorKind::Network, 1.5);
    }

    if status == Some(429) || mentions(RATE_LIMIT_PATTERNS) {
        return ErrorClassification {
            use_retry_after: true,
            ..ErrorClassification::retryable(ErrorKind::RateLimit, 3.0)
        };
    }

    if matches!(status, Some(500..=599)) {
        return ErrorClassification::retryable(ErrorKind::ServerError, 2.0);
    }

    if matches!(status, Some(401 | 403)) || mentions(AUTH_PATTERNS) {
        return ErrorClassification::terminal(ErrorKind::Auth);
    }

    if status == Some(400) || mentions(VALIDATION_PATTERNS) {
        return ErrorClassification::terminal(ErrorKind::Validation);
    }

    if matches!(status, Some(400..=499)) {
        return ErrorClassification::terminal(ErrorKind::ClientError);
    }

    // Assume transient unless proven permanent
    ErrorClassification::retryable(ErrorKind::Unknown, 2.0)
}

/// Classify any failure exposing [`FailureDetails`]
pub fn classify_failure<E>(error: &E) -> ErrorClassification
where
    E: FailureDetails + ?Sized,
{
    classify(&error.message(), error.status_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OperationError;

    #[test]
    fn test_network_messages() {
        for message in [
            "read ECONNRESET",
            "getaddrinfo ENOTFOUND api.example.com",
            "Request Timeout",
            "connect ETIMEDOUT 10.0.0.1:443",
            "Network is unreachable",
            "connection reset by peer",
        ] {
            let c = classify(message, None);
            assert_eq!(c.kind, ErrorKind::Network, "{}", message);
            assert!(c.retryable);
            assert_eq!(c.backoff_multiplier, 1.5);
            assert!(!c.use_retry_after);
        }
    }

    #[test]
    fn test_network_wins_over_status() {
        // Rule order: message-based network match comes before status rules
        let c = classify("gateway timeout", Some(504));
        assert_eq!(c.kind, ErrorKind::Network);

        let c = classify("timeout while validating", Some(401));
        assert_eq!(c.kind, ErrorKind::Network);
    }

    #[test]
    fn test_rate_limit() {
        let by_status = classify("slow down", Some(429));
        assert_eq!(by_status.kind, ErrorKind::RateLimit);
        assert!(by_status.retryable);
        assert_eq!(by_status.backoff_multiplier, 3.0);
        assert!(by_status.use_retry_after);

        let by_message = classify("Too Many Requests", None);
        assert_eq!(by_message.kind, ErrorKind::RateLimit);

        let by_phrase = classify("Rate limit exceeded for model", Some(400));
        assert_eq!(by_phrase.kind, ErrorKind::RateLimit);
    }

    #[test]
    fn test_server_errors() {
        for status in [500, 502, 503, 599] {
            let c = classify("upstream failure", Some(status));
            assert_eq!(c.kind, ErrorKind::ServerError);
            assert!(c.retryable);
            assert_eq!(c.backoff_multiplier, 2.0);
        }
        assert_ne!(classify("odd", Some(600)).kind, ErrorKind::ServerError);
    }

    #[test]
    fn test_auth_is_terminal() {
        for status in [401, 403] {
            let c = classify("denied", Some(status));
            assert_eq!(c.kind, ErrorKind::Auth);
            assert!(!c.retryable);
        }
        assert_eq!(classify("Missing API key", None).kind, ErrorKind::Auth);
        assert_eq!(classify("FORBIDDEN", None).kind, ErrorKind::Auth);
    }

    #[test]
    fn test_validation_is_terminal() {
        let c = classify("bad request", Some(400));
        assert_eq!(c.kind, ErrorKind::Validation);
        assert!(!c.retryable);

        assert_eq!(
            classify("Invalid prompt format", None).kind,
            ErrorKind::Validation
        );
        assert_eq!(
            classify("schema validation failed", Some(422)).kind,
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_other_client_errors() {
        for status in [404, 409, 422, 499] {
            let c = classify("nope", Some(status));
            assert_eq!(c.kind, ErrorKind::ClientError);
            assert!(!c.retryable);
        }
    }

    #[test]
    fn test_unknown_is_retried_with_caution() {
        let c = classify("something odd happened", None);
        assert_eq!(c.kind, ErrorKind::Unknown);
        assert!(c.retryable);
        assert_eq!(c.backoff_multiplier, 2.0);

        assert_eq!(classify("moved", Some(301)).kind, ErrorKind::Unknown);
    }

    #[test]
    fn test_classify_failure_uses_details() {
        let err = OperationError::with_status(403, "access denied");
        assert_eq!(classify_failure(&err).kind, ErrorKind::Auth);

        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "operation timed out");
        assert_eq!(classify_failure(&io).kind, ErrorKind::Network);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::RateLimit.to_string(), "rate_limit");
        assert_eq!(ErrorKind::ClientError.to_string(), "client_error");
    }
}
