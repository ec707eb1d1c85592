//! Download engine: one resilient transfer per invocation.
//!
//! This module provides the [`DownloadEngine`], which resolves redirects,
//! streams the body to disk with throttled progress callbacks, verifies the
//! result, and retries whole attempts on failure.
//!
//! # Overview
//!
//! Each attempt walks `Init → ResolvingRedirect → Streaming → Verifying` and
//! ends in `Completed` or `Failed`. A failed attempt removes whatever it wrote
//! before the next attempt starts, so the destination never holds a partial
//! or zero-byte file once [`DownloadEngine::download`] returns an error.
//!
//! # Example
//!
//! ```no_run
//! use comfyfetch_core::download::DownloadEngine;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::with_defaults();
//! let report = engine
//!     .download(
//!         "https://huggingface.co/org/model/resolve/main/model.safetensors",
//!         Path::new("./models/checkpoints/model.safetensors"),
//!         None,
//!     )
//!     .await?;
//! println!("{} bytes in {} attempt(s)", report.bytes_written, report.attempts);
//! # Ok(())
//! # }
//! ```

mod attempt;

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use self::attempt::{AttemptPhase, DownloadAttempt, remove_partial, until_cancelled};
use super::client::truncate_for_log;
use super::constants::{DEFAULT_PROGRESS_STEP_PERCENT, DEFAULT_SIZE_TOLERANCE_BYTES};
use super::progress::ProgressCallback;
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
use super::{DownloadError, HttpClient};

/// Tunables for the download engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Attempt budget and inter-attempt delay.
    pub retry_policy: RetryPolicy,
    /// Size difference (bytes) tolerated before a mismatch warning.
    pub size_tolerance_bytes: u64,
    /// Progress callbacks fire each time this many percent are crossed.
    pub progress_step_percent: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            size_tolerance_bytes: DEFAULT_SIZE_TOLERANCE_BYTES,
            progress_step_percent: DEFAULT_PROGRESS_STEP_PERCENT,
        }
    }
}

/// Outcome of a successful download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    /// Where the file was written.
    pub path: PathBuf,
    /// Bytes written by the successful attempt. Always greater than zero.
    pub bytes_written: u64,
    /// Content length declared by the server, if any.
    pub declared_size: Option<u64>,
    /// Attempts used, including the successful one.
    pub attempts: u32,
    /// URL the body was finally streamed from.
    pub effective_url: String,
    /// Whether the written size fell outside the size tolerance.
    pub size_mismatch: bool,
}

/// Performs single-file transfers with retry and verification.
///
/// The engine holds no per-transfer state: every invocation owns its attempt
/// bookkeeping and progress throttle, so one engine can serve many sequential
/// or concurrent calls. Two calls writing the same destination still race.
#[derive(Debug, Clone)]
pub struct DownloadEngine {
    client: HttpClient,
    config: EngineConfig,
}

impl DownloadEngine {
    /// Creates an engine from a client and configuration.
    #[must_use]
    pub fn new(client: HttpClient, config: EngineConfig) -> Self {
        debug!(
            max_attempts = config.retry_policy.max_attempts(),
            retry_delay_ms = config.retry_policy.delay().as_millis(),
            size_tolerance_bytes = config.size_tolerance_bytes,
            progress_step_percent = config.progress_step_percent,
            "creating download engine"
        );
        Self { client, config }
    }

    /// Creates an engine with a default client and configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(HttpClient::new(), EngineConfig::default())
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Downloads `url` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`] for a malformed URL, or
    /// [`DownloadError::ExhaustedRetries`] wrapping the last failure once the
    /// attempt budget is spent.
    pub async fn download(
        &self,
        url: &str,
        destination: &Path,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> Result<DownloadReport, DownloadError> {
        self.download_with_cancel(url, destination, on_progress, None)
            .await
    }

    /// Downloads `url` to `destination`, aborting when `cancel` fires.
    ///
    /// Cancellation interrupts the in-flight attempt or the delay before the
    /// next one. The partial file is removed and no further attempt is made.
    ///
    /// # Errors
    ///
    /// As [`DownloadEngine::download`], plus [`DownloadError::Cancelled`].
    #[instrument(skip(self, on_progress, cancel), fields(url = %truncate_for_log(url), destination = %destination.display()))]
    pub async fn download_with_cancel(
        &self,
        url: &str,
        destination: &Path,
        on_progress: Option<ProgressCallback<'_>>,
        cancel: Option<&CancellationToken>,
    ) -> Result<DownloadReport, DownloadError> {
        let policy = &self.config.retry_policy;
        let mut attempt_number = 0u32;

        loop {
            attempt_number += 1;
            let mut attempt = DownloadAttempt::new(url, destination, attempt_number);
            debug!(attempt = attempt_number, "starting download attempt");

            let error = match self.run_attempt(&mut attempt, on_progress, cancel).await {
                Ok(size_mismatch) => {
                    attempt.enter(AttemptPhase::Completed);
                    info!(
                        path = %destination.display(),
                        bytes = attempt.bytes_transferred,
                        attempts = attempt_number,
                        "download complete"
                    );
                    return Ok(DownloadReport {
                        path: destination.to_path_buf(),
                        bytes_written: attempt.bytes_transferred,
                        declared_size: attempt.declared_size,
                        attempts: attempt_number,
                        effective_url: attempt.effective_url,
                        size_mismatch,
                    });
                }
                Err(error) => error,
            };

            warn!(
                attempt = attempt_number,
                phase = ?attempt.phase(),
                bytes = attempt.bytes_transferred,
                error = %error,
                "download attempt failed"
            );
            attempt.enter(AttemptPhase::Failed);
            remove_partial(destination).await;

            let failure_type = classify_error(&error);
            match policy.should_retry(failure_type, attempt_number) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    info!(
                        attempt = next_attempt,
                        max_attempts = policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        "retrying download"
                    );
                    until_cancelled(cancel, url, async {
                        tokio::time::sleep(delay).await;
                        Ok(())
                    })
                    .await?;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(%reason, "not retrying download");
                    return Err(match failure_type {
                        FailureType::Transient => DownloadError::exhausted(attempt_number, error),
                        FailureType::Permanent | FailureType::Cancelled => error,
                    });
                }
            }
        }
    }

    /// Runs one attempt to completion. Returns the size-mismatch flag.
    async fn run_attempt(
        &self,
        attempt: &mut DownloadAttempt,
        on_progress: Option<ProgressCallback<'_>>,
        cancel: Option<&CancellationToken>,
    ) -> Result<bool, DownloadError> {
        attempt.enter(AttemptPhase::ResolvingRedirect);
        let resolved = until_cancelled(
            cancel,
            &attempt.source_url,
            self.client.resolve_source(&attempt.source_url),
        )
        .await?;

        attempt.effective_url = resolved.effective_url.to_string();
        attempt.declared_size = resolved.response.content_length().filter(|len| *len > 0);
        debug!(
            effective_url = %truncate_for_log(&attempt.effective_url),
            hops = resolved.hops,
            declared_size = attempt.declared_size,
            "resolved download source"
        );

        attempt.enter(AttemptPhase::Streaming);
        attempt
            .stream_to_file(
                resolved.response,
                on_progress,
                self.config.progress_step_percent,
                cancel,
            )
            .await?;

        attempt.enter(AttemptPhase::Verifying);
        attempt.verify(self.config.size_tolerance_bytes).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.retry_policy.max_attempts(), 3);
        assert_eq!(config.retry_policy.delay(), Duration::from_secs(2));
        assert_eq!(config.size_tolerance_bytes, 1024);
        assert!((config.progress_step_percent - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_engine_stores_config() {
        let config = EngineConfig {
            retry_policy: RetryPolicy::new(5, Duration::from_millis(10)),
            ..EngineConfig::default()
        };
        let engine = DownloadEngine::new(HttpClient::new(), config);
        assert_eq!(engine.config().retry_policy.max_attempts(), 5);
    }

    #[tokio::test]
    async fn test_invalid_url_fails_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("model.safetensors");
        let engine = DownloadEngine::with_defaults();

        let started = std::time::Instant::now();
        let result = engine.download("not a url", &destination, None).await;

        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
        assert!(started.elapsed() < Duration::from_secs(2), "should not wait for a retry");
        assert!(!destination.exists());
    }
}
