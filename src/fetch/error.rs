//! Errors produced while fetching

use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during a single fetch attempt
#[derive(Debug, Error)]
pub enum FetchError {
    /// The url was empty
    #[error("Invalid url: {0:?}")]
    InvalidUrl(String),

    /// A zero per-attempt timeout would fail every attempt before it starts
    #[error("Timeout must be greater than zero")]
    InvalidTimeout,

    /// Connection or protocol failure
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { status: StatusCode, url: String },

    /// The attempt did not complete in time and was aborted
    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The body of a successful response was not the expected JSON
    #[error("Failed to parse JSON response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    /// Whether the failure came from the per-attempt timer
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout(_))
    }

    /// HTTP status of the failed response, if the server answered
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Transport(e) => e.status(),
            _ => None,
        }
    }
}

/// Record of one failed attempt made by the retry loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// 0-based attempt index
    pub index: u32,
    /// Timeout applied to the attempt
    pub timeout: Duration,
    /// Description of the error the attempt failed with
    pub error: String,
}

/// Terminal failure of a retried operation
///
/// Carries the last attempt's error plus the history of every attempt, so the
/// causes of earlier failures are not lost.
#[derive(Debug)]
pub struct RetryFailure {
    /// Error from the final attempt
    pub last: FetchError,
    /// One record per attempt, in order
    pub history: Vec<AttemptRecord>,
}

impl RetryFailure {
    /// Number of attempts made before giving up
    pub fn attempts(&self) -> usize {
        self.history.len()
    }

    /// Discards the history and keeps only the last error
    pub fn into_last(self) -> FetchError {
        self.last
    }
}

impl fmt::Display for RetryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "all {} attempts failed, last error: {}", self.history.len(), self.last)
    }
}

impl std::error::Error for RetryFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.last)
    }
}
