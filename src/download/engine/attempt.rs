//! State and streaming for a single download attempt.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Instant;

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::super::DownloadError;
use super::super::progress::{DownloadProgress, ProgressCallback, ProgressThrottle};

/// Lifecycle of one attempt. Every retry starts again at `Init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttemptPhase {
    Init,
    ResolvingRedirect,
    Streaming,
    Verifying,
    Completed,
    Failed,
}

/// Bookkeeping for one in-flight attempt.
#[derive(Debug)]
pub(crate) struct DownloadAttempt {
    pub(crate) source_url: String,
    pub(crate) effective_url: String,
    pub(crate) destination: PathBuf,
    pub(crate) attempt_number: u32,
    pub(crate) bytes_transferred: u64,
    pub(crate) declared_size: Option<u64>,
    pub(crate) started_at: Instant,
    phase: AttemptPhase,
}

impl DownloadAttempt {
    pub(crate) fn new(source_url: &str, destination: &Path, attempt_number: u32) -> Self {
        Self {
            source_url: source_url.to_string(),
            effective_url: source_url.to_string(),
            destination: destination.to_path_buf(),
            attempt_number,
            bytes_transferred: 0,
            declared_size: None,
            started_at: Instant::now(),
            phase: AttemptPhase::Init,
        }
    }

    pub(crate) fn phase(&self) -> AttemptPhase {
        self.phase
    }

    pub(crate) fn enter(&mut self, phase: AttemptPhase) {
        debug!(
            attempt = self.attempt_number,
            from = ?self.phase,
            to = ?phase,
            "attempt phase change"
        );
        self.phase = phase;
    }

    /// Streams `response` into the destination, creating parent directories.
    ///
    /// Progress is reported against the declared size only; with no declared
    /// size the callback is never invoked.
    pub(crate) async fn stream_to_file(
        &mut self,
        response: reqwest::Response,
        on_progress: Option<ProgressCallback<'_>>,
        progress_step_percent: f64,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), DownloadError> {
        if let Some(parent) = self
            .destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }

        let file = File::create(&self.destination)
            .await
            .map_err(|e| DownloadError::io(self.destination.clone(), e))?;
        let mut writer = BufWriter::new(file);
        let mut stream = response.bytes_stream();
        let mut throttle = ProgressThrottle::new(progress_step_percent);
        let total = self.declared_size.unwrap_or(0);

        loop {
            let next =
                until_cancelled(cancel, &self.source_url, async { Ok(stream.next().await) })
                    .await?;
            let Some(chunk_result) = next else {
                break;
            };
            let chunk = chunk_result.map_err(|e| DownloadError::stream(&self.effective_url, e))?;

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(self.destination.clone(), e))?;

            self.bytes_transferred += chunk.len() as u64;

            if let Some(callback) = on_progress {
                if total > 0 {
                    let progress = DownloadProgress::new(
                        self.bytes_transferred,
                        total,
                        self.started_at.elapsed(),
                    );
                    if throttle.should_report(progress.percentage) {
                        callback(&progress);
                    }
                }
            }
        }

        writer
            .flush()
            .await
            .map_err(|e| DownloadError::io(self.destination.clone(), e))?;

        Ok(())
    }

    /// Checks the written file. Returns `true` when its size differs from the
    /// declared size by more than `tolerance` bytes.
    pub(crate) async fn verify(&self, tolerance: u64) -> Result<bool, DownloadError> {
        let metadata = tokio::fs::metadata(&self.destination)
            .await
            .map_err(|e| DownloadError::io(self.destination.clone(), e))?;
        let written = metadata.len();

        if written == 0 {
            return Err(DownloadError::integrity(
                self.destination.clone(),
                "downloaded file is empty",
            ));
        }

        let mismatch = self
            .declared_size
            .filter(|declared| *declared > 0)
            .is_some_and(|declared| written.abs_diff(declared) > tolerance);
        if mismatch {
            warn!(
                path = %self.destination.display(),
                written,
                declared = self.declared_size,
                tolerance,
                "downloaded size differs from declared size"
            );
        }
        Ok(mismatch)
    }
}

/// Runs `fut` unless `cancel` fires first.
pub(crate) async fn until_cancelled<T, F>(
    cancel: Option<&CancellationToken>,
    url: &str,
    fut: F,
) -> Result<T, DownloadError>
where
    F: Future<Output = Result<T, DownloadError>>,
{
    match cancel {
        Some(token) => {
            tokio::select! {
                biased;
                () = token.cancelled() => Err(DownloadError::cancelled(url)),
                result = fut => result,
            }
        }
        None => fut.await,
    }
}

/// Removes a partially written destination. Failures are logged, never raised.
pub(crate) async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove partial file"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_attempt_starts_in_init() {
        let attempt = DownloadAttempt::new("https://x/model.safetensors", Path::new("/m/a"), 2);
        assert_eq!(attempt.phase(), AttemptPhase::Init);
        assert_eq!(attempt.attempt_number, 2);
        assert_eq!(attempt.bytes_transferred, 0);
        assert_eq!(attempt.effective_url, attempt.source_url);
    }

    #[test]
    fn test_enter_changes_phase() {
        let mut attempt = DownloadAttempt::new("https://x", Path::new("/m/a"), 1);
        attempt.enter(AttemptPhase::Streaming);
        assert_eq!(attempt.phase(), AttemptPhase::Streaming);
    }

    #[tokio::test]
    async fn test_verify_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.safetensors");
        tokio::fs::write(&path, b"").await.unwrap();
        let attempt = DownloadAttempt::new("https://x", &path, 1);
        let result = attempt.verify(1024).await;
        assert!(matches!(result, Err(DownloadError::Integrity { .. })));
    }

    #[tokio::test]
    async fn test_verify_flags_mismatch_beyond_tolerance_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        tokio::fs::write(&path, vec![1u8; 4096]).await.unwrap();

        let mut attempt = DownloadAttempt::new("https://x", &path, 1);
        attempt.declared_size = Some(4096 + 1024);
        assert!(!attempt.verify(1024).await.unwrap());

        attempt.declared_size = Some(4096 + 1025);
        assert!(attempt.verify(1024).await.unwrap());

        attempt.declared_size = None;
        assert!(!attempt.verify(0).await.unwrap());
    }

    #[tokio::test]
    async fn test_until_cancelled_prefers_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let result: Result<u8, _> = until_cancelled(Some(&token), "https://x", async { Ok(1) }).await;
        assert!(matches!(result, Err(DownloadError::Cancelled { .. })));
    }

    #[tokio::test]
    async fn test_remove_partial_ignores_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        remove_partial(&dir.path().join("never-written.bin")).await;
    }
}
