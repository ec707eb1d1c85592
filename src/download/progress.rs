//! Progress accounting for a single transfer.

use std::time::Duration;

use indicatif::HumanBytes;

/// Snapshot handed to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadProgress {
    /// Bytes written so far in the current attempt.
    pub downloaded: u64,
    /// Declared content length.
    pub total: u64,
    /// `downloaded / total` in percent.
    pub percentage: f64,
    /// Average throughput since the attempt started.
    pub bytes_per_sec: f64,
}

impl DownloadProgress {
    pub(crate) fn new(downloaded: u64, total: u64, elapsed: Duration) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let percentage = if total == 0 {
            0.0
        } else {
            downloaded as f64 / total as f64 * 100.0
        };
        let secs = elapsed.as_secs_f64();
        #[allow(clippy::cast_precision_loss)]
        let bytes_per_sec = if secs > 0.0 {
            downloaded as f64 / secs
        } else {
            0.0
        };
        Self {
            downloaded,
            total,
            percentage,
            bytes_per_sec,
        }
    }

    /// Human-readable throughput, e.g. `12.50 MiB/s`.
    #[must_use]
    pub fn speed_label(&self) -> String {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rate = self.bytes_per_sec.max(0.0) as u64;
        format!("{}/s", HumanBytes(rate))
    }
}

/// Callback invoked when the transfer crosses a progress step.
pub type ProgressCallback<'a> = &'a (dyn Fn(&DownloadProgress) + Send + Sync);

/// Decides when a callback is due. Owned by one attempt; never shared.
#[derive(Debug)]
pub(crate) struct ProgressThrottle {
    step_percent: f64,
    last_reported: f64,
}

impl ProgressThrottle {
    pub(crate) fn new(step_percent: f64) -> Self {
        Self {
            step_percent: step_percent.max(0.0),
            last_reported: 0.0,
        }
    }

    /// Returns true, and records the report, when `percentage` moved at
    /// least one step past the last reported value.
    pub(crate) fn should_report(&mut self, percentage: f64) -> bool {
        if percentage - self.last_reported >= self.step_percent {
            self.last_reported = percentage;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percentage_and_speed() {
        let progress = DownloadProgress::new(50, 200, Duration::from_secs(2));
        assert!((progress.percentage - 25.0).abs() < f64::EPSILON);
        assert!((progress.bytes_per_sec - 25.0).abs() < f64::EPSILON);
        assert_eq!(progress.speed_label(), "25 B/s");
    }

    #[test]
    fn test_progress_unknown_total_is_zero_percent() {
        let progress = DownloadProgress::new(50, 0, Duration::ZERO);
        assert!(progress.percentage.abs() < f64::EPSILON);
        assert!(progress.bytes_per_sec.abs() < f64::EPSILON);
    }

    #[test]
    fn test_throttle_reports_whole_steps() {
        let mut throttle = ProgressThrottle::new(10.0);
        assert!(!throttle.should_report(4.0));
        assert!(!throttle.should_report(9.9));
        assert!(throttle.should_report(10.0));
        assert!(!throttle.should_report(19.0));
        assert!(throttle.should_report(35.0));
        assert!(!throttle.should_report(44.0));
        assert!(throttle.should_report(100.0));
        assert!(!throttle.should_report(100.0));
    }

    #[test]
    fn test_throttle_zero_step_reports_every_change() {
        let mut throttle = ProgressThrottle::new(0.0);
        assert!(throttle.should_report(0.5));
        assert!(throttle.should_report(0.6));
    }
}
