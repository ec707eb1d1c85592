//! Model-type classification.
//!
//! Classification runs an ordered cascade of pure strategies over a
//! [`ClassificationEvidence`] bundle. The first strategy that recognizes the
//! artifact wins; later strategies are never consulted. When none does, a
//! plain filename check decides, defaulting to [`ModelType::Checkpoint`].
//!
//! | Tier | Looks at |
//! |------|----------|
//! | [`Tier::Metadata`] | pipeline label, tags, library label, model id |
//! | [`Tier::Filename`] | filename and its extension-stripped basename |
//! | [`Tier::Identifier`] | model id and its last path segment |
//! | [`Tier::FileSize`] | declared size of the target file |
//!
//! # Example
//!
//! ```
//! use comfyfetch_core::classify::{ClassificationEvidence, ModelType, Tier, classify_with_tier};
//!
//! let evidence = ClassificationEvidence::new("pytorch_lora_weights.safetensors", "someone/style")
//!     .with_tags(["LoRA"]);
//! let result = classify_with_tier(&evidence);
//! assert_eq!(result.model_type, ModelType::Lora);
//! assert_eq!(result.tier, Tier::Metadata);
//! ```

mod evidence;
mod strategies;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

pub use evidence::ClassificationEvidence;

/// Functional category of a model artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModelType {
    /// Full diffusion checkpoint.
    Checkpoint,
    /// Variational autoencoder.
    Vae,
    /// Low-rank adaptation (and LyCORIS variants).
    Lora,
    /// ControlNet / conditioning model.
    ControlNet,
    /// Image upscaler (ESRGAN, SwinIR, ...).
    Upscale,
    /// Text encoder.
    Clip,
    /// Standalone diffusion UNet.
    Unet,
}

impl ModelType {
    /// Every model type, in declaration order.
    pub const ALL: [ModelType; 7] = [
        ModelType::Checkpoint,
        ModelType::Vae,
        ModelType::Lora,
        ModelType::ControlNet,
        ModelType::Upscale,
        ModelType::Clip,
        ModelType::Unet,
    ];

    /// Canonical lower-case label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Checkpoint => "checkpoint",
            Self::Vae => "vae",
            Self::Lora => "lora",
            Self::ControlNet => "controlnet",
            Self::Upscale => "upscale",
            Self::Clip => "clip",
            Self::Unet => "unet",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognized model type label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown model type '{label}' (expected one of: checkpoint, vae, lora, controlnet, upscale, clip, unet)")]
pub struct ParseModelTypeError {
    label: String,
}

impl FromStr for ModelType {
    type Err = ParseModelTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == label)
            .ok_or(ParseModelTypeError { label })
    }
}

/// Which cascade step produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Hub metadata: pipeline label, tags, library, model id keywords.
    Metadata,
    /// Filename keyword families.
    Filename,
    /// Model identifier keywords.
    Identifier,
    /// Declared file size.
    FileSize,
    /// Plain filename substring check, then `checkpoint`.
    Fallback,
}

/// A model type together with the tier that decided it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// The resolved type. Never unknown.
    pub model_type: ModelType,
    /// The tier that produced it.
    pub tier: Tier,
}

/// Classifies the artifact described by `evidence`.
#[must_use]
pub fn classify(evidence: &ClassificationEvidence) -> ModelType {
    classify_with_tier(evidence).model_type
}

/// Classifies and reports which tier decided.
#[must_use]
pub fn classify_with_tier(evidence: &ClassificationEvidence) -> Classification {
    for (tier, strategy) in strategies::CASCADE {
        if let Some(model_type) = strategy(evidence) {
            debug!(filename = %evidence.filename, ?tier, %model_type, "model type detected");
            return Classification { model_type, tier };
        }
    }

    let model_type = strategies::fallback(evidence);
    debug!(filename = %evidence.filename, %model_type, "model type from fallback");
    Classification {
        model_type,
        tier: Tier::Fallback,
    }
}
