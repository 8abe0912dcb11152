//! Triage error types
//!
//! Structured errors for report parsing, git blame lookups and tracker calls.
//! Every variant carries a recovery hint so CI logs say what to fix.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for triage operations
pub type TriageResult<T> = Result<T, TriageError>;

/// Errors that can occur while reconciling test failures
#[derive(Error, Debug)]
pub enum TriageError {
    /// Test report file does not exist
    #[error("File \"{}\" does not exist", .path.display())]
    ReportNotFound { path: PathBuf },

    /// Test report exists but is not a usable XML report
    #[error("File \"{}\" is not a valid test report: {message}", .path.display())]
    InvalidReport { path: PathBuf, message: String },

    /// Git operation failed
    #[error("Git operation failed: {operation} - {message}")]
    GitError { operation: String, message: String },

    /// Blame produced no line for the requested target
    #[error("No blame information for {target} in {file}")]
    BlameNotFound { file: String, target: String },

    /// Ticket tracker rejected or failed a request
    #[error("Tracker request failed: {operation} - {message}")]
    TrackerError { operation: String, message: String },

    /// Collaborator call exceeded its deadline
    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// IO error wrapper
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TriageError {
    /// Create a report not found error
    pub fn report_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ReportNotFound { path: path.into() }
    }

    /// Create an invalid report error
    pub fn invalid_report(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidReport {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a git error
    pub fn git(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GitError {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a blame-not-found error
    pub fn blame_not_found(file: impl Into<String>, target: impl Into<String>) -> Self {
        Self::BlameNotFound {
            file: file.into(),
            target: target.into(),
        }
    }

    /// Create a tracker error
    pub fn tracker(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TrackerError {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Check if this error is retryable (transient failure)
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::GitError { message, .. } => {
                let lower = message.to_lowercase();
                lower.contains("lock")
                    || lower.contains("timeout")
                    || lower.contains("connection")
                    || lower.contains("another git process")
            }
            Self::TrackerError { message, .. } => {
                message.starts_with("HTTP 429")
                    || message.starts_with("HTTP 502")
                    || message.starts_with("HTTP 503")
                    || message.contains("timed out")
            }
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Get recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::ReportNotFound { .. } => Some(
                "Run the test suite with xunit output enabled first, e.g. \
                 `nosetests --with-xunit`, or pass --report with the right path.",
            ),
            Self::InvalidReport { .. } => Some(
                "The report is not well-formed xunit XML. Check that the test run \
                 finished and was not truncated.",
            ),
            Self::GitError { message, .. } => {
                let lower = message.to_lowercase();
                if lower.contains("not a git repository") {
                    Some("Run from inside the repository or pass --repo.")
                } else if lower.contains("no such path") || lower.contains("no such ref") {
                    Some("The file is not tracked at HEAD. Check the traceback path.")
                } else {
                    Some("Check git status and repository state: git status")
                }
            }
            Self::BlameNotFound { .. } => Some(
                "The test definition or failing line is not present at HEAD. \
                 The report may be stale.",
            ),
            Self::TrackerError { message, .. } => {
                if message.contains("401") || message.contains("403") {
                    Some("Check JIRA_USERNAME and JIRA_API_TOKEN.")
                } else {
                    Some("Check JIRA_SERVER and the tracker's availability.")
                }
            }
            Self::Timeout { .. } => {
                Some("Increase --timeout or REPORTER_TIMEOUT_SECS and retry.")
            }
            Self::ConfigError { .. } => Some(
                "Check configuration settings. Verify flags, the config file and \
                 environment variables.",
            ),
            Self::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => {
                    Some("File or directory not found. Check the path exists.")
                }
                std::io::ErrorKind::PermissionDenied => {
                    Some("Permission denied. Check file permissions: ls -la <path>")
                }
                _ => Some("IO error occurred. Check disk space and file permissions."),
            },
            Self::Json(_) => Some("The tracker returned an unexpected JSON payload."),
        }
    }

    /// Get error with recovery suggestion formatted
    pub fn with_suggestion(&self) -> String {
        match self.recovery_suggestion() {
            Some(suggestion) => format!("{}\n\nRecovery: {}", self, suggestion),
            None => self.to_string(),
        }
    }
}
