//! Error types for the download module.
//!
//! Every variant carries the URL or path it relates to, so a failure surfaced
//! after the retry budget is exhausted still names its distinguishing cause.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while transferring a file.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Network-level error before a response arrived (DNS, connection refused, TLS).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL being requested.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before a response arrived.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP response other than a followable redirect.
    #[error("HTTP {status} from {url}{}", excerpt_suffix(.body_excerpt.as_deref()))]
    Transport {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Leading part of the response body, when one was readable.
        body_excerpt: Option<String>,
    },

    /// A redirect response could not be followed.
    #[error("cannot follow redirect from {url}: {reason}")]
    Redirect {
        /// The URL that answered with the redirect.
        url: String,
        /// Why the redirect was rejected.
        reason: String,
    },

    /// Failure while reading the response body.
    #[error("stream error reading {url}: {source}")]
    Stream {
        /// The effective URL being streamed.
        url: String,
        /// The underlying body error.
        #[source]
        source: reqwest::Error,
    },

    /// File system error while writing the destination.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The completed transfer failed verification.
    #[error("integrity check failed for {path}: {reason}")]
    Integrity {
        /// Destination that failed verification.
        path: PathBuf,
        /// What the check found.
        reason: String,
    },

    /// The transfer was aborted through its cancellation token.
    #[error("download of {url} cancelled")]
    Cancelled {
        /// The URL whose transfer was cancelled.
        url: String,
    },

    /// All attempts failed; wraps the last error encountered.
    #[error("download failed after {attempts} attempts: {source}")]
    ExhaustedRetries {
        /// Number of attempts made.
        attempts: u32,
        /// The error from the final attempt.
        #[source]
        source: Box<DownloadError>,
    },
}

fn excerpt_suffix(excerpt: Option<&str>) -> String {
    excerpt.map_or_else(String::new, |body| format!(": {body}"))
}

impl DownloadError {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a transport (HTTP status) error.
    pub fn transport(url: impl Into<String>, status: u16, body_excerpt: Option<String>) -> Self {
        Self::Transport {
            url: url.into(),
            status,
            body_excerpt,
        }
    }

    /// Creates a redirect error.
    pub fn redirect(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Redirect {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a body stream error.
    pub fn stream(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Stream {
            url: url.into(),
            source,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an integrity error.
    pub fn integrity(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Integrity {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Wraps the last attempt's error after the retry budget is spent.
    pub fn exhausted(attempts: u32, last: DownloadError) -> Self {
        Self::ExhaustedRetries {
            attempts,
            source: Box::new(last),
        }
    }

    /// Returns the underlying error, looking through [`DownloadError::ExhaustedRetries`].
    #[must_use]
    pub fn last_error(&self) -> &DownloadError {
        match self {
            Self::ExhaustedRetries { source, .. } => source.last_error(),
            other => other,
        }
    }

    /// Returns the HTTP status for transport failures.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self.last_error() {
            Self::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the number of attempts made, when the retry budget was exhausted.
    #[must_use]
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::ExhaustedRetries { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs the
// url or path the source error lacks, so callers go through the constructors.
