//! Error classification traits for retry logic and error handling.
//!
//! Errors describe themselves so that generic code can decide whether to
//! retry, skip the current unit of work, or stop the whole run.

use std::time::Duration;

use super::common::*;

/// Classification of error types for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// May resolve on retry (network issues, timeouts, 5xx)
    Transient,
    /// Won't resolve on retry (bad input, 4xx, missing partition)
    Permanent,
    /// Rate limits, pool exhaustion
    ResourceExhausted,
    /// Wiring or contract defects (unknown dataset, wrong timestamp format)
    Configuration,
    /// Bugs, unexpected state
    Internal,
}

/// Trait for errors that can classify themselves.
///
/// # Example
///
/// ```rust,ignore
/// use grid_common::error::{ErrorClassification, ErrorCategory};
///
/// match err.category() {
///     ErrorCategory::Configuration => return Err(err),
///     _ => warn!("skipping chunk: {}", err),
/// }
/// ```
pub trait ErrorClassification {
    /// Returns the category of this error
    fn category(&self) -> ErrorCategory;

    /// Returns true if this error is transient and may succeed on retry
    fn is_transient(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transient | ErrorCategory::ResourceExhausted
        )
    }

    /// Returns true if this error is permanent and won't succeed on retry
    fn is_permanent(&self) -> bool {
        matches!(self.category(), ErrorCategory::Permanent)
    }

    /// Returns true if the error points at a configuration or contract defect
    fn is_configuration(&self) -> bool {
        matches!(self.category(), ErrorCategory::Configuration)
    }

    /// Suggests a delay before retrying, if applicable
    fn suggested_retry_delay(&self) -> Option<Duration> {
        match self.category() {
            ErrorCategory::Transient => Some(Duration::from_millis(500)),
            ErrorCategory::ResourceExhausted => Some(Duration::from_secs(5)),
            _ => None,
        }
    }

    /// Returns the maximum number of retries suggested for this error
    fn max_retries(&self) -> u32 {
        match self.category() {
            ErrorCategory::Transient => 3,
            ErrorCategory::ResourceExhausted => 5,
            _ => 0,
        }
    }
}

impl ErrorClassification for DatabaseError {
    fn category(&self) -> ErrorCategory {
        match self {
            DatabaseError::Connection(_) => ErrorCategory::Transient,
            DatabaseError::PoolExhausted => ErrorCategory::ResourceExhausted,
            DatabaseError::Transaction(_) => ErrorCategory::Transient,
            DatabaseError::Query(_) => ErrorCategory::Permanent,
            DatabaseError::Constraint { .. } => ErrorCategory::Permanent,
        }
    }

    fn suggested_retry_delay(&self) -> Option<Duration> {
        match self {
            DatabaseError::PoolExhausted => Some(Duration::from_millis(500)),
            DatabaseError::Connection(_) => Some(Duration::from_secs(1)),
            DatabaseError::Transaction(_) => Some(Duration::from_millis(50)),
            _ => None,
        }
    }
}

impl ErrorClassification for NetworkError {
    fn category(&self) -> ErrorCategory {
        match self {
            NetworkError::Connection(_) => ErrorCategory::Transient,
            NetworkError::Timeout(_) => ErrorCategory::Transient,
            NetworkError::Receive(_) => ErrorCategory::Transient,
            NetworkError::Request(_) => ErrorCategory::Permanent,
            NetworkError::Status { status, .. } => match *status {
                429 => ErrorCategory::ResourceExhausted,
                500..=599 => ErrorCategory::Transient,
                _ => ErrorCategory::Permanent,
            },
        }
    }

    fn suggested_retry_delay(&self) -> Option<Duration> {
        match self {
            NetworkError::Status { status: 429, .. } => Some(Duration::from_secs(10)),
            NetworkError::Connection(_) => Some(Duration::from_secs(2)),
            _ if self.is_transient() => Some(Duration::from_millis(500)),
            _ => None,
        }
    }
}

impl ErrorClassification for ConfigurationError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// Retry an async operation while it fails with a transient error.
///
/// Permanent and configuration errors are returned immediately. The delay
/// doubles after every attempt and is capped at 30 seconds.
pub async fn retry_with_backoff<T, E, F, Fut>(
    mut operation: F,
    max_attempts: u32,
    initial_delay: Duration,
) -> Result<T, E>
where
    E: ErrorClassification + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempts = 0;
    let mut delay = initial_delay;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempts += 1;

                if !err.is_transient() || attempts >= max_attempts {
                    return Err(err);
                }

                let retry_delay = err.suggested_retry_delay().unwrap_or(delay).max(delay);
                tracing::debug!(
                    "Attempt {}/{} failed ({}), retrying in {:?}",
                    attempts,
                    max_attempts,
                    err,
                    retry_delay
                );
                tokio::time::sleep(retry_delay).await;

                delay = std::cmp::min(delay * 2, Duration::from_secs(30));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_database_error_classification() {
        let err = DatabaseError::Connection("refused".to_string());
        assert!(err.is_transient());
        assert!(err.suggested_retry_delay().is_some());

        let err = DatabaseError::Constraint {
            code: DatabaseError::CHECK_VIOLATION.to_string(),
            message: "no partition of relation \"entsoe_load\" found for row".to_string(),
        };
        assert!(err.is_permanent());
        assert!(err.is_missing_partition());
    }

    #[test]
    fn test_network_status_classification() {
        assert!(NetworkError::status(503, "unavailable").is_transient());
        assert_eq!(
            NetworkError::status(429, "slow down").category(),
            ErrorCategory::ResourceExhausted
        );
        assert!(NetworkError::status(401, "bad token").is_permanent());
        assert!(NetworkError::Timeout("deadline elapsed".to_string()).is_transient());
    }

    #[test]
    fn test_status_body_is_truncated() {
        let long = "x".repeat(1000);
        match NetworkError::status(500, &long) {
            NetworkError::Status { body, .. } => assert_eq!(body.len(), 200),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_configuration_error_classification() {
        let err = ConfigurationError::invalid("calendar.timezone", "unknown zone");
        assert!(err.is_configuration());
        assert_eq!(err.max_retries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_stops_on_permanent_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), NetworkError> = retry_with_backoff(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(NetworkError::status(404, "missing")) }
            },
            5,
            Duration::from_millis(10),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_error() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, NetworkError> = retry_with_backoff(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(NetworkError::status(502, "bad gateway"))
                    } else {
                        Ok(n)
                    }
                }
            },
            5,
            Duration::from_millis(10),
        )
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
