//! Subprocess invocation as a protected operation

use once_cell::sync::Lazy;
use regex::Regex;
use std::io::ErrorKind;
use steady_resilience::OperationError;
use tokio::process::Command;

static STATUS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:http|status)(?:/[\d.]+)?[\s:=]*([1-5]\d{2})\b")
        .expect("status pattern is valid")
});

/// A program plus arguments, run once per attempt
#[derive(Debug, Clone)]
pub struct ProcessOperation {
    program: String,
    args: Vec<String>,
}

impl ProcessOperation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split `argv` into program and arguments
    pub fn from_argv(mut argv: Vec<String>) -> Option<Self> {
        if argv.is_empty() {
            return None;
        }
        let program = argv.remove(0);
        Some(Self::new(program, argv))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run the program and capture stdout
    pub async fn invoke(&self) -> Result<String, OperationError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| spawn_failure(&self.program, e))?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        Err(failure_from_output(
            output.status.code(),
            &String::from_utf8_lossy(&output.stderr),
        ))
    }
}

/// Missing or non-executable programs will not fix themselves
fn spawn_failure(program: &str, error: std::io::Error) -> OperationError {
    match error.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => {
            OperationError::new(format!("invalid command '{}': {}", program, error))
        }
        _ => OperationError::new(format!("failed to start '{}': {}", program, error)),
    }
}

/// Build an operation error from a failed process
pub fn failure_from_output(exit_code: Option<i32>, stderr: &str) -> OperationError {
    let stderr = stderr.trim();
    let message = if stderr.is_empty() {
        match exit_code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        }
    } else {
        stderr.to_string()
    };

    let mut error = OperationError::new(message);
    if let Some(status) = extract_status(stderr) {
        error = error.status(status);
    }
    error
}

/// Find an HTTP-style status code such as `HTTP 503` or `status: 429`
pub fn extract_status(text: &str) -> Option<u16> {
    STATUS_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use steady_resilience::{classify_failure, ErrorKind as FailureKind};

    #[test]
    fn test_extract_status() {
        assert_eq!(
            extract_status("curl: (22) The requested URL returned error: HTTP 503"),
            Some(503)
        );
        assert_eq!(extract_status("HTTP/1.1 429 Too Many Requests"), Some(429));
        assert_eq!(extract_status("request failed with status: 401"), Some(401));
        assert_eq!(extract_status("Status=404"), Some(404));
        assert_eq!(extract_status("retrying in 503 ms"), None);
        assert_eq!(extract_status("no code here"), None);
    }

    #[test]
    fn test_failure_from_output() {
        let err = failure_from_output(Some(2), "  \n");
        assert_eq!(err.message, "exit status 2");
        assert!(err.status.is_none());

        let err = failure_from_output(Some(1), "error: HTTP 500 from upstream\n");
        assert_eq!(err.message, "error: HTTP 500 from upstream");
        assert_eq!(err.status, Some(500));
        assert_eq!(classify_failure(&err).kind, FailureKind::ServerError);

        let err = failure_from_output(None, "");
        assert_eq!(err.message, "terminated by signal");
    }

    #[test]
    fn test_from_argv() {
        assert!(ProcessOperation::from_argv(vec![]).is_none());
        let op = ProcessOperation::from_argv(vec!["echo".into(), "hi".into()]).unwrap();
        assert_eq!(op.program(), "echo");
    }

    #[tokio::test]
    async fn test_missing_program_is_terminal() {
        let op = ProcessOperation::new("steady-definitely-not-a-program", vec![]);
        let err = op.invoke().await.unwrap_err();
        assert!(err.message.starts_with("invalid command"));
        assert!(!classify_failure(&err).retryable);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invoke_captures_output() {
        let op = ProcessOperation::new("sh", vec!["-c".into(), "echo hello".into()]);
        assert_eq!(op.invoke().await.unwrap(), "hello\n");

        let op = ProcessOperation::new(
            "sh",
            vec!["-c".into(), "echo 'status: 429' >&2; exit 3".into()],
        );
        let err = op.invoke().await.unwrap_err();
        assert_eq!(err.status, Some(429));
    }
}
