//! Constants for the download module (timeouts, retry budget, verification).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle read timeout (5 minutes between body reads for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Maximum redirect hops followed while resolving the effective source URL.
pub const MAX_REDIRECT_HOPS: usize = 5;

/// Default fixed delay between download attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Absolute size discrepancy tolerated before a size-mismatch warning.
pub const DEFAULT_SIZE_TOLERANCE_BYTES: u64 = 1024;

/// Default progress notification granularity, in percent.
pub const DEFAULT_PROGRESS_STEP_PERCENT: f64 = 10.0;

/// Maximum number of response body bytes kept for transport error messages.
pub const BODY_EXCERPT_LIMIT: usize = 500;

/// Effective URLs are truncated to this many characters in log output.
pub const LOGGED_URL_LIMIT: usize = 100;
