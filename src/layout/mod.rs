//! ComfyUI `models/` directory layout.
//!
//! Maps model types (and the looser labels found in hub tags) to the
//! subdirectory ComfyUI loads them from, locates ComfyUI installations and
//! lists the models already installed.

pub mod detect;
pub mod inventory;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::classify::ModelType;

pub use detect::{DetectionMethod, Installation, InstallationKind, detect_installation};
pub use inventory::{DirectoryScan, Inventory, ScanStatus, scan_inventory};

/// Directory unknown labels are filed under.
pub const DEFAULT_DIRECTORY: &str = "checkpoints";

/// Errors raised while preparing or reading the models tree.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// File system error on `path`.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A model type filter that names no known directory.
    #[error("unknown model type '{label}'; supported: {supported}")]
    UnknownModelType {
        /// The rejected label.
        label: String,
        /// Comma-separated accepted labels.
        supported: String,
    },
}

impl LayoutError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl ModelType {
    /// Subdirectory of `models/` this type is installed into.
    #[must_use]
    pub fn directory_name(self) -> &'static str {
        match self {
            Self::Checkpoint => "checkpoints",
            Self::Vae => "vae",
            Self::Lora => "loras",
            Self::ControlNet => "controlnet",
            Self::Upscale => "upscale_models",
            Self::Clip => "clip",
            Self::Unet => "unet",
        }
    }
}

/// Label aliases beyond the canonical model type names.
const LABEL_ALIASES: &[(&str, &str)] = &[
    ("diffusion", "checkpoints"),
    ("stable-diffusion", "checkpoints"),
    ("sdxl", "checkpoints"),
    ("sd15", "checkpoints"),
    ("flux", "checkpoints"),
    ("unknown", "checkpoints"),
    ("autoencoder", "vae"),
    ("variational-autoencoder", "vae"),
    ("adapter", "loras"),
    ("low-rank-adaptation", "loras"),
    ("lycoris", "loras"),
    ("locon", "loras"),
    ("loha", "loras"),
    ("lokr", "loras"),
    ("control-net", "controlnet"),
    ("control_net", "controlnet"),
    ("conditioning", "controlnet"),
    ("upscaler", "upscale_models"),
    ("super-resolution", "upscale_models"),
    ("esrgan", "upscale_models"),
    ("real-esrgan", "upscale_models"),
    ("swinir", "upscale_models"),
    ("text-encoder", "clip"),
    ("text_encoder", "clip"),
    ("vision-language", "clip"),
    ("u-net", "unet"),
    ("diffusion-model", "unet"),
    ("checkpoints", "checkpoints"),
    ("loras", "loras"),
    ("upscale_models", "upscale_models"),
];

/// Directory for a free-form type label. Unknown labels map to `checkpoints`.
#[must_use]
pub fn directory_for_label(label: &str) -> &'static str {
    let lower = label.trim().to_lowercase();
    if let Ok(model_type) = lower.parse::<ModelType>() {
        return model_type.directory_name();
    }
    LABEL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map_or(DEFAULT_DIRECTORY, |(_, dir)| *dir)
}

/// `models_root/<directory for model_type>`.
#[must_use]
pub fn model_directory(models_root: &Path, model_type: ModelType) -> PathBuf {
    models_root.join(model_type.directory_name())
}

/// Creates `dir` and its parents if missing.
///
/// # Errors
///
/// [`LayoutError::Io`] when the directory cannot be created.
pub async fn ensure_model_directory(dir: &Path) -> Result<(), LayoutError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| LayoutError::io(dir, e))?;
    debug!(dir = %dir.display(), "model directory ready");
    Ok(())
}
