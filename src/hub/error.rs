//! Error types for hub metadata and file resolution.

use thiserror::Error;

/// Errors raised while resolving which file to download.
///
/// None of these are retried: they describe the repository, not the network
/// path to it (metadata fetches already get one fallback attempt).
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The model identifier is not a valid `owner/name` repository id.
    #[error("invalid model id '{model_id}': {reason}")]
    InvalidModelId {
        /// The rejected identifier.
        model_id: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// Neither the primary nor the fallback metadata request succeeded.
    #[error("failed to fetch model metadata from {url}: {reason}")]
    Metadata {
        /// The metadata URL.
        url: String,
        /// Failure of the last request made.
        reason: String,
    },

    /// The explicitly requested file is not in the listing.
    #[error("file '{filename}' not found in model {model_id}")]
    NotFound {
        /// The model identifier.
        model_id: String,
        /// The requested filename.
        filename: String,
    },

    /// The listing is empty, so there is nothing to download.
    #[error("no suitable file found for model {model_id}")]
    NoSuitableFile {
        /// The model identifier.
        model_id: String,
    },
}

impl ResolveError {
    /// Creates an invalid model id error.
    pub fn invalid_model_id(model_id: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidModelId {
            model_id: model_id.into(),
            reason,
        }
    }

    /// Creates a metadata fetch error.
    pub fn metadata(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Metadata {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(model_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self::NotFound {
            model_id: model_id.into(),
            filename: filename.into(),
        }
    }

    /// Creates a no-suitable-file error.
    pub fn no_suitable_file(model_id: impl Into<String>) -> Self {
        Self::NoSuitableFile {
            model_id: model_id.into(),
        }
    }
}
