//! Resolve, classify, file and download a model in one call.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::download::{DownloadEngine, DownloadReport, ProgressCallback};
use crate::error::Error;
use crate::hub::{HubClient, ResolvedModel};
use crate::layout::{LayoutError, ensure_model_directory, model_directory};

/// What to fetch and where the models tree is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Hub model id, `owner/name`.
    pub model_id: String,
    /// Exact repository file; picked automatically when `None`.
    pub filename: Option<String>,
    /// Root of the `models/` tree.
    pub models_dir: PathBuf,
    /// Replace an existing file instead of skipping.
    pub overwrite: bool,
}

impl FetchRequest {
    /// Request for `model_id` into `models_dir`, auto-selecting the file.
    #[must_use]
    pub fn new(model_id: impl Into<String>, models_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_id: model_id.into(),
            filename: None,
            models_dir: models_dir.into(),
            overwrite: false,
        }
    }
}

/// Result of [`ModelFetcher::fetch_model`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The file was downloaded to `path`.
    Downloaded {
        /// Local file written.
        path: PathBuf,
        /// The resolved remote file and its type.
        resolved: ResolvedModel,
        /// Transfer details.
        report: DownloadReport,
    },
    /// A file already exists at `path` and overwriting was not requested.
    AlreadyExists {
        /// The existing local file.
        path: PathBuf,
        /// The resolved remote file and its type.
        resolved: ResolvedModel,
    },
}

impl FetchOutcome {
    /// Local path of the model file.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Downloaded { path, .. } | Self::AlreadyExists { path, .. } => path,
        }
    }
}

/// Combines the hub client and the download engine.
#[derive(Debug, Clone)]
pub struct ModelFetcher {
    hub: HubClient,
    engine: DownloadEngine,
}

impl ModelFetcher {
    /// Creates a fetcher.
    #[must_use]
    pub fn new(hub: HubClient, engine: DownloadEngine) -> Self {
        Self { hub, engine }
    }

    /// The hub client.
    #[must_use]
    pub fn hub(&self) -> &HubClient {
        &self.hub
    }

    /// The download engine.
    #[must_use]
    pub fn engine(&self) -> &DownloadEngine {
        &self.engine
    }

    /// Resolves the model's file, picks its type directory and downloads it.
    ///
    /// Files land in `models_dir/<type dir>/<file name>`, where the file name
    /// is the last path segment of the repository name.
    ///
    /// # Errors
    ///
    /// [`Error::Resolve`], [`Error::Layout`] or [`Error::Download`] from the
    /// failing step; [`Error::InvalidFilename`] if the remote name has no
    /// usable last segment.
    #[instrument(skip(self, on_progress, cancel), fields(model_id = %request.model_id))]
    pub async fn fetch_model(
        &self,
        request: &FetchRequest,
        on_progress: Option<ProgressCallback<'_>>,
        cancel: Option<&CancellationToken>,
    ) -> Result<FetchOutcome, Error> {
        let resolved = self
            .hub
            .resolve_and_classify(&request.model_id, request.filename.as_deref())
            .await?;

        let file_name = local_file_name(&resolved.descriptor.name)?;
        let target_dir = model_directory(&request.models_dir, resolved.model_type);
        ensure_model_directory(&target_dir).await?;
        let path = target_dir.join(file_name);

        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| LayoutError::io(path.clone(), e))?;
        if exists && !request.overwrite {
            info!(path = %path.display(), "model already present, skipping download");
            return Ok(FetchOutcome::AlreadyExists { path, resolved });
        }

        let report = self
            .engine
            .download_with_cancel(&resolved.descriptor.download_url, &path, on_progress, cancel)
            .await?;

        Ok(FetchOutcome::Downloaded {
            path,
            resolved,
            report,
        })
    }
}

/// Last `/`-separated segment of a repository file name.
fn local_file_name(remote_name: &str) -> Result<&str, Error> {
    match remote_name.rsplit('/').next() {
        Some(name) if !name.is_empty() && name != "." && name != ".." && !name.contains('\\') => {
            Ok(name)
        }
        _ => Err(Error::InvalidFilename {
            name: remote_name.to_string(),
        }),
    }
}
