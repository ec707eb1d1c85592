//! Listing models already installed under a `models/` directory.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use super::LayoutError;

/// Directories scanned when no type filter is given.
pub const INVENTORY_DIRECTORIES: [&str; 9] = [
    "checkpoints",
    "loras",
    "vae",
    "controlnet",
    "upscale_models",
    "clip",
    "unet",
    "embeddings",
    "hypernetworks",
];

/// File extensions counted as model files (compared case-insensitively).
pub const MODEL_EXTENSIONS: [&str; 6] = [".safetensors", ".ckpt", ".pt", ".pth", ".bin", ".pkl"];

/// Accepted `--type` labels, singular and plural.
const TYPE_FILTERS: [(&str, &str); 14] = [
    ("lora", "loras"),
    ("loras", "loras"),
    ("checkpoint", "checkpoints"),
    ("checkpoints", "checkpoints"),
    ("vae", "vae"),
    ("controlnet", "controlnet"),
    ("upscale_model", "upscale_models"),
    ("upscale_models", "upscale_models"),
    ("clip", "clip"),
    ("unet", "unet"),
    ("embedding", "embeddings"),
    ("embeddings", "embeddings"),
    ("hypernetwork", "hypernetworks"),
    ("hypernetworks", "hypernetworks"),
];

/// Outcome of scanning one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStatus {
    /// Directory read.
    Scanned,
    /// Directory does not exist.
    Missing,
    /// Directory exists but could not be read.
    Failed(String),
}

/// Model files found in one type directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryScan {
    /// Directory name, e.g. `loras`.
    pub directory: &'static str,
    /// Full path scanned.
    pub path: PathBuf,
    /// Model file names, sorted.
    pub files: Vec<String>,
    /// Whether the scan succeeded.
    pub status: ScanStatus,
}

/// Scan results for a models tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    /// The models directory scanned.
    pub models_dir: PathBuf,
    /// One entry per scanned type directory, in scan order.
    pub scans: Vec<DirectoryScan>,
}

impl Inventory {
    /// Number of model files across all directories.
    #[must_use]
    pub fn total_files(&self) -> usize {
        self.scans.iter().map(|s| s.files.len()).sum()
    }
}

/// Maps a `--type` label to its directory.
///
/// # Errors
///
/// [`LayoutError::UnknownModelType`] listing the accepted labels.
pub fn inventory_directory_for(label: &str) -> Result<&'static str, LayoutError> {
    let lower = label.trim().to_lowercase();
    TYPE_FILTERS
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, dir)| *dir)
        .ok_or_else(|| LayoutError::UnknownModelType {
            label: label.to_string(),
            supported: TYPE_FILTERS
                .iter()
                .map(|(alias, _)| *alias)
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// True for model weights files, excluding ComfyUI's `put_..._here` placeholders.
#[must_use]
pub fn is_model_file(name: &str) -> bool {
    let lower = name.to_lowercase();
    MODEL_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
        && !lower.contains("put_")
        && !lower.contains("_here")
}

/// Scans `models_dir`, optionally only the directory for `type_filter`.
///
/// Missing or unreadable directories are reported in the result, not raised.
///
/// # Errors
///
/// [`LayoutError::UnknownModelType`] for an unrecognized `type_filter`.
#[instrument(skip(models_dir), fields(models_dir = %models_dir.display()))]
pub async fn scan_inventory(
    models_dir: &Path,
    type_filter: Option<&str>,
) -> Result<Inventory, LayoutError> {
    let directories: Vec<&'static str> = match type_filter {
        Some(label) => vec![inventory_directory_for(label)?],
        None => INVENTORY_DIRECTORIES.to_vec(),
    };

    let mut scans = Vec::with_capacity(directories.len());
    for directory in directories {
        let path = models_dir.join(directory);
        let (files, status) = match list_model_files(&path).await {
            Ok(files) => (files, ScanStatus::Scanned),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (Vec::new(), ScanStatus::Missing),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot scan model directory");
                (Vec::new(), ScanStatus::Failed(e.to_string()))
            }
        };
        debug!(directory, files = files.len(), ?status, "scanned model directory");
        scans.push(DirectoryScan {
            directory,
            path,
            files,
            status,
        });
    }

    Ok(Inventory {
        models_dir: models_dir.to_path_buf(),
        scans,
    })
}

async fn list_model_files(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_model_file(&name) {
            files.push(name);
        }
    }
    files.sort();
    Ok(files)
}
