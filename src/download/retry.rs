//! Whole-attempt retry budget.
//!
//! A failed attempt is sorted into a [`FailureType`]; transient failures are
//! retried after a fixed delay until the budget runs out, permanent failures
//! and cancellations end the download at once.
//!
//! ```
//! use comfyfetch_core::download::{DownloadError, RetryDecision, RetryPolicy, classify_error};
//!
//! let policy = RetryPolicy::default();
//! let error = DownloadError::transport("https://example.com/model.safetensors", 503, None);
//!
//! if let RetryDecision::Retry { delay, attempt } = policy.should_retry(classify_error(&error), 1) {
//!     assert_eq!(attempt, 2);
//!     assert_eq!(delay, policy.delay());
//! }
//! ```

use std::time::Duration;

use tracing::{debug, instrument};

use super::DownloadError;
use super::constants::DEFAULT_RETRY_DELAY;

/// Attempts per download when nothing else is configured.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// How a failed attempt affects the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Worth another attempt: bad status, dropped connection, empty file.
    Transient,

    /// Repeating cannot help.
    Permanent,

    /// Aborted by the caller.
    Cancelled,
}

/// Outcome of [`RetryPolicy::should_retry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Run another attempt after `delay`.
    Retry {
        /// Wait before the next attempt.
        delay: Duration,
        /// Number of the next attempt, counting from 1.
        attempt: u32,
    },

    /// Stop here.
    DoNotRetry {
        /// Why the loop stops.
        reason: String,
    },
}

/// Attempt budget with a fixed inter-attempt delay.
///
/// # Default Values
///
/// - `max_attempts`: 3
/// - `delay`: 2 seconds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempt budget, first attempt included.
    max_attempts: u32,

    /// Wait between a failed attempt and the next one.
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Policy allowing `max_attempts` attempts (at least one) spaced by `delay`.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Policy with the default delay.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Attempt budget.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay between attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        let stop = |reason: String| RetryDecision::DoNotRetry { reason };
        match failure_type {
            FailureType::Permanent => stop("error is not retryable".to_string()),
            FailureType::Cancelled => stop("transfer cancelled".to_string()),
            FailureType::Transient if attempt >= self.max_attempts => {
                debug!(attempt, "attempt budget spent");
                stop(format!("all {} attempts exhausted", self.max_attempts))
            }
            FailureType::Transient => {
                let next = attempt + 1;
                debug!(next, delay_ms = self.delay.as_millis(), "scheduling retry");
                RetryDecision::Retry {
                    delay: self.delay,
                    attempt: next,
                }
            }
        }
    }
}

/// Maps a download error to its [`FailureType`].
///
/// | Error | Type |
/// |-------|------|
/// | Transport, Network, Timeout, Redirect | Transient |
/// | Stream, Io, Integrity | Transient |
/// | InvalidUrl, ExhaustedRetries | Permanent |
/// | Cancelled | Cancelled |
#[must_use]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::Transport { .. }
        | DownloadError::Network { .. }
        | DownloadError::Timeout { .. }
        | DownloadError::Redirect { .. }
        | DownloadError::Stream { .. }
        | DownloadError::Io { .. }
        | DownloadError::Integrity { .. } => FailureType::Transient,

        DownloadError::InvalidUrl { .. } | DownloadError::ExhaustedRetries { .. } => {
            FailureType::Permanent
        }

        DownloadError::Cancelled { .. } => FailureType::Cancelled,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ==================== Policy Tests ====================

    #[test]
    fn test_default_policy_is_three_attempts_two_seconds_apart() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), DEFAULT_MAX_RETRIES);
        assert_eq!(policy.delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        assert_eq!(RetryPolicy::with_max_attempts(0).max_attempts(), 1);
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[test]
    fn test_delay_is_fixed_across_attempts() {
        let policy = RetryPolicy::new(5, Duration::from_millis(750));
        for attempt in 1..5 {
            match policy.should_retry(FailureType::Transient, attempt) {
                RetryDecision::Retry { delay, .. } => {
                    assert_eq!(delay, Duration::from_millis(750));
                }
                other => panic!("Expected Retry at attempt {attempt}, got {other:?}"),
            }
        }
    }

    // ==================== Decision Tests ====================

    #[test]
    fn test_transient_failures_retry_until_budget() {
        let policy = RetryPolicy::new(3, Duration::from_millis(5));
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 1),
            RetryDecision::Retry { attempt: 2, .. }
        ));
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 2),
            RetryDecision::Retry { attempt: 3, .. }
        ));
        match policy.should_retry(FailureType::Transient, 3) {
            RetryDecision::DoNotRetry { reason } => assert!(reason.contains("exhausted")),
            other => panic!("Expected DoNotRetry at the budget, got {other:?}"),
        }
    }

    #[test]
    fn test_permanent_failure_stops_on_first_attempt() {
        assert!(matches!(
            RetryPolicy::default().should_retry(FailureType::Permanent, 1),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_should_retry_cancelled_does_not_retry() {
        let policy = RetryPolicy::default();
        if let RetryDecision::DoNotRetry { reason } =
            policy.should_retry(FailureType::Cancelled, 1)
        {
            assert!(reason.contains("cancelled"));
        } else {
            panic!("Expected DoNotRetry for cancellation");
        }
    }

    // ==================== Error Classification Tests ====================

    #[test]
    fn test_classify_transport_errors_transient() {
        for status in [404, 429, 500, 502, 503] {
            let error = DownloadError::transport("https://example.com", status, None);
            assert_eq!(classify_error(&error), FailureType::Transient, "status {status}");
        }
    }

    #[test]
    fn test_classify_stream_side_errors_transient() {
        let io_err = std::io::Error::new(std::io::ErrorKind::StorageFull, "disk full");
        assert_eq!(
            classify_error(&DownloadError::io("/models/x", io_err)),
            FailureType::Transient
        );
        assert_eq!(
            classify_error(&DownloadError::integrity("/models/x", "empty")),
            FailureType::Transient
        );
        assert_eq!(
            classify_error(&DownloadError::timeout("https://example.com")),
            FailureType::Transient
        );
        assert_eq!(
            classify_error(&DownloadError::redirect("https://example.com", "no Location")),
            FailureType::Transient
        );
    }

    #[test]
    fn test_classify_invalid_url_and_exhausted_permanent() {
        let invalid = DownloadError::invalid_url("not-a-url");
        assert_eq!(classify_error(&invalid), FailureType::Permanent);
        let exhausted = DownloadError::exhausted(3, DownloadError::timeout("https://example.com"));
        assert_eq!(classify_error(&exhausted), FailureType::Permanent);
    }

    #[test]
    fn test_classify_cancelled() {
        let error = DownloadError::cancelled("https://example.com");
        assert_eq!(classify_error(&error), FailureType::Cancelled);
    }
}
