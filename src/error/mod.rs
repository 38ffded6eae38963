//! Error definitions
//!
//! This module provides error types for timekit.

use std::time::Duration;
use thiserror::Error;

/// Main error type for timekit
#[derive(Error, Debug)]
pub enum Error {
    /// An argument was outside its valid range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A polled condition never became true within its limit
    #[error("Condition never passed after {elapsed:?} (limit {limit:?})")]
    Timeout {
        /// Real time spent polling
        elapsed: Duration,
        /// Configured maximum wait
        limit: Duration,
    },
}

impl Error {
    /// Create an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a timeout error.
    #[must_use]
    pub fn timeout(elapsed: Duration, limit: Duration) -> Self {
        Self::Timeout { elapsed, limit }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_names_the_value() {
        let err = Error::invalid_argument("increment must be >= 1 ms, got 0");
        assert_eq!(
            err.to_string(),
            "Invalid argument: increment must be >= 1 ms, got 0"
        );
    }

    #[test]
    fn test_timeout_reports_elapsed_and_limit() {
        let err = Error::timeout(Duration::from_millis(2004), Duration::from_secs(2));
        let message = err.to_string();
        assert!(message.contains("2.004s"), "unexpected message: {message}");
        assert!(message.contains("2s"), "unexpected message: {message}");
    }
}
