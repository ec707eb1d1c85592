//! Top-level error type for fetch orchestration.

use thiserror::Error;

use crate::download::DownloadError;
use crate::hub::ResolveError;
use crate::layout::LayoutError;

/// Errors from [`crate::ModelFetcher::fetch_model`].
#[derive(Debug, Error)]
pub enum Error {
    /// Resolving or classifying the remote file failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The transfer failed.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Preparing the destination directory failed.
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// The remote file name cannot be used as a local file name.
    #[error("remote file name '{name}' cannot be used as a local file name")]
    InvalidFilename {
        /// The remote name.
        name: String,
    },
}
