//! The classifier cascade: one pure function per tier, in priority order.

use std::sync::LazyLock;

use regex::Regex;

use super::{ClassificationEvidence, ModelType, Tier};

pub(crate) type Strategy = fn(&ClassificationEvidence) -> Option<ModelType>;

/// Tiers in priority order. First `Some` wins.
pub(crate) const CASCADE: [(Tier, Strategy); 4] = [
    (Tier::Metadata, from_metadata),
    (Tier::Filename, from_filename),
    (Tier::Identifier, from_identifier),
    (Tier::FileSize, from_file_size),
];

const MIB: f64 = 1024.0 * 1024.0;

/// Extensions stripped from a filename before token matching.
#[allow(clippy::expect_used)]
static MODEL_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.(safetensors|ckpt|pt|pth|bin)$").expect("model extension regex is valid") // Static pattern, safe to panic
});

/// `adapter` or `rank16` with `-`/`_` on both sides.
#[allow(clippy::expect_used)]
static LORA_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[-_](adapter|rank\d+)[-_]").expect("lora marker regex is valid")
});

/// `control` with `-`/`_` on both sides.
#[allow(clippy::expect_used)]
static CONTROL_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_]control[-_]").expect("control marker regex is valid"));

/// Tag vocabulary for one model type: exact tag names, plus a substring
/// looked for inside any tag.
struct TagFamily {
    model_type: ModelType,
    exact: &'static [&'static str],
    contains: &'static str,
}

const TAG_FAMILIES: [TagFamily; 6] = [
    TagFamily {
        model_type: ModelType::Lora,
        exact: &["lora", "low-rank-adaptation", "adapter"],
        contains: "lora",
    },
    TagFamily {
        model_type: ModelType::Vae,
        exact: &["vae", "variational-autoencoder", "autoencoder"],
        contains: "vae",
    },
    TagFamily {
        model_type: ModelType::ControlNet,
        exact: &["controlnet", "control-net", "conditioning"],
        contains: "controlnet",
    },
    TagFamily {
        model_type: ModelType::Upscale,
        exact: &["upscaler", "super-resolution", "esrgan", "real-esrgan"],
        contains: "upscal",
    },
    TagFamily {
        model_type: ModelType::Clip,
        exact: &["clip", "text-encoder", "vision-language"],
        contains: "clip",
    },
    TagFamily {
        model_type: ModelType::Unet,
        exact: &["unet", "u-net", "diffusion-model"],
        contains: "unet",
    },
];

/// Filename vocabulary for one model type: substrings of the whole
/// lower-cased name.
struct NameFamily {
    model_type: ModelType,
    substrings: &'static [&'static str],
}

const NAME_FAMILIES: [NameFamily; 6] = [
    NameFamily {
        model_type: ModelType::Lora,
        substrings: &["lora", "lycoris", "locon", "loha", "lokr"],
    },
    NameFamily {
        model_type: ModelType::Vae,
        substrings: &["vae", "autoencoder"],
    },
    NameFamily {
        model_type: ModelType::ControlNet,
        substrings: &[
            "controlnet",
            "control_net",
            "control-net",
            "canny",
            "depth",
            "openpose",
            "scribble",
            "mlsd",
            "normal",
            "seg",
        ],
    },
    NameFamily {
        model_type: ModelType::Upscale,
        substrings: &["upscal", "esrgan", "swinir", "ldsr", "scunet"],
    },
    NameFamily {
        model_type: ModelType::Clip,
        substrings: &["clip", "text_encoder", "text-encoder"],
    },
    NameFamily {
        model_type: ModelType::Unet,
        substrings: &["unet", "u-net", "diffusion_pytorch_model"],
    },
];

/// Tier 1: hub pipeline label, then tags, then library, then model id.
fn from_metadata(evidence: &ClassificationEvidence) -> Option<ModelType> {
    if let Some(from_pipeline) = evidence.pipeline_label.as_deref().and_then(|pipeline| {
        match pipeline {
            "text-to-image" | "image-to-image" | "unconditional-image-generation" => {
                Some(image_generation_type(evidence))
            }
            "image-classification" | "object-detection" => Some(ModelType::ControlNet),
            "feature-extraction" => {
                if evidence.any_tag_contains("vae") {
                    Some(ModelType::Vae)
                } else if evidence.any_tag_contains("clip") {
                    Some(ModelType::Clip)
                } else {
                    None
                }
            }
            _ => None,
        }
    }) {
        return Some(from_pipeline);
    }

    if let Some(family) = TAG_FAMILIES
        .iter()
        .find(|f| evidence.any_tag_in(f.exact) || evidence.any_tag_contains(f.contains))
    {
        return Some(family.model_type);
    }

    match evidence.library_label.as_deref() {
        Some("diffusers") => return Some(ModelType::Checkpoint),
        Some("transformers") => return Some(ModelType::Clip),
        _ => {}
    }

    let id = evidence.model_id.to_lowercase();
    if id.contains("lora") || id.contains("adapter") {
        Some(ModelType::Lora)
    } else if id.contains("vae") {
        Some(ModelType::Vae)
    } else if id.contains("controlnet") {
        Some(ModelType::ControlNet)
    } else {
        None
    }
}

/// Image-generation pipelines are checkpoints unless tags say otherwise.
fn image_generation_type(evidence: &ClassificationEvidence) -> ModelType {
    if evidence.any_tag_contains("lora") {
        ModelType::Lora
    } else if evidence.any_tag_contains("controlnet") {
        ModelType::ControlNet
    } else if evidence.any_tag_in(&["super-resolution", "upscaling", "esrgan"]) {
        ModelType::Upscale
    } else {
        ModelType::Checkpoint
    }
}

/// Tier 2: keyword families over the filename.
fn from_filename(evidence: &ClassificationEvidence) -> Option<ModelType> {
    let lower = evidence.filename.to_lowercase();
    let basename = MODEL_EXTENSION.replace(&lower, "");

    NAME_FAMILIES
        .iter()
        .find(|family| {
            family.substrings.iter().any(|s| lower.contains(s))
                || delimited_marker(family.model_type).is_some_and(|re| re.is_match(&basename))
        })
        .map(|family| family.model_type)
}

/// Bounded marker checked against the extension-stripped name.
fn delimited_marker(model_type: ModelType) -> Option<&'static Regex> {
    match model_type {
        ModelType::Lora => Some(&*LORA_MARKER),
        ModelType::ControlNet => Some(&*CONTROL_MARKER),
        _ => None,
    }
}

/// Tier 3: keywords in the model id and its repository name. No clip/unet.
fn from_identifier(evidence: &ClassificationEvidence) -> Option<ModelType> {
    let id = evidence.model_id.to_lowercase();
    let repo = id.rsplit('/').next().unwrap_or_default();

    if id.contains("lora") || id.contains("lycoris") || repo.contains("adapter") {
        Some(ModelType::Lora)
    } else if id.contains("vae") || repo.contains("autoencoder") {
        Some(ModelType::Vae)
    } else if id.contains("controlnet") || id.contains("control-net") || repo.contains("control")
    {
        Some(ModelType::ControlNet)
    } else if id.contains("upscal") || id.contains("esrgan") {
        Some(ModelType::Upscale)
    } else {
        None
    }
}

/// Tier 4: declared size of the target file.
fn from_file_size(evidence: &ClassificationEvidence) -> Option<ModelType> {
    #[allow(clippy::cast_precision_loss)]
    let mib = evidence.declared_size()? as f64 / MIB;
    let lower = evidence.filename.to_lowercase();

    if mib < 500.0
        && lower.contains("safetensors")
        && (["rank", "dim", "alpha"].iter().any(|k| lower.contains(k)) || mib < 200.0)
    {
        return Some(ModelType::Lora);
    }

    if mib > 100.0 && mib < 1000.0 && (lower.contains("vae") || lower.contains("autoencoder")) {
        return Some(ModelType::Vae);
    }

    None
}

/// Last resort: plain substrings of the filename, else checkpoint.
pub(crate) fn fallback(evidence: &ClassificationEvidence) -> ModelType {
    const SIMPLE: [(&str, ModelType); 6] = [
        ("vae", ModelType::Vae),
        ("lora", ModelType::Lora),
        ("controlnet", ModelType::ControlNet),
        ("upscale", ModelType::Upscale),
        ("clip", ModelType::Clip),
        ("unet", ModelType::Unet),
    ];
    let lower = evidence.filename.to_lowercase();
    SIMPLE
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map_or(ModelType::Checkpoint, |(_, model_type)| *model_type)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MIB_U64: u64 = 1024 * 1024;

    fn named(filename: &str) -> ClassificationEvidence {
        ClassificationEvidence::new(filename, "org/model")
    }

    // ==================== Metadata tier ====================

    #[test]
    fn test_metadata_image_pipeline_refined_by_tags() {
        let base = named("x.safetensors").with_pipeline_label("image-to-image");
        assert_eq!(from_metadata(&base), Some(ModelType::Checkpoint));
        assert_eq!(
            from_metadata(&base.clone().with_tags(["sdxl-lora"])),
            Some(ModelType::Lora)
        );
        assert_eq!(
            from_metadata(&base.clone().with_tags(["controlnet-canny"])),
            Some(ModelType::ControlNet)
        );
        assert_eq!(
            from_metadata(&base.with_tags(["super-resolution"])),
            Some(ModelType::Upscale)
        );
    }

    #[test]
    fn test_metadata_feature_extraction_needs_tags() {
        let base = named("x.bin").with_pipeline_label("feature-extraction");
        assert_eq!(from_metadata(&base), None);
        assert_eq!(
            from_metadata(&base.clone().with_tags(["sd-vae"])),
            Some(ModelType::Vae)
        );
        assert_eq!(
            from_metadata(&base.with_tags(["open-clip"])),
            Some(ModelType::Clip)
        );
    }

    #[test]
    fn test_metadata_tag_family_precedence() {
        // lora outranks vae when both families are tagged
        let evidence = named("x").with_tags(["vae", "lora"]);
        assert_eq!(from_metadata(&evidence), Some(ModelType::Lora));

        let evidence = named("x").with_tags(["conditioning"]);
        assert_eq!(from_metadata(&evidence), Some(ModelType::ControlNet));

        let evidence = named("x").with_tags(["diffusion-model"]);
        assert_eq!(from_metadata(&evidence), Some(ModelType::Unet));
    }

    #[test]
    fn test_metadata_library_then_model_id() {
        assert_eq!(
            from_metadata(&named("x").with_library_label("Diffusers")),
            Some(ModelType::Checkpoint)
        );
        assert_eq!(
            from_metadata(&named("x").with_library_label("transformers")),
            Some(ModelType::Clip)
        );
        assert_eq!(
            from_metadata(&ClassificationEvidence::new("x", "org/ip-adapter")),
            Some(ModelType::Lora)
        );
        assert_eq!(from_metadata(&named("x").with_library_label("timm")), None);
    }

    // ==================== Filename tier ====================

    #[test]
    fn test_filename_lora_markers_need_delimiters_on_both_sides() {
        assert_eq!(
            from_filename(&named("style_rank16_v2.safetensors")),
            Some(ModelType::Lora)
        );
        assert_eq!(
            from_filename(&named("sd15-adapter-v1.safetensors")),
            Some(ModelType::Lora)
        );
        assert_eq!(from_filename(&named("ip-adapter.bin")), None);
        assert_eq!(from_filename(&named("rank32_style.safetensors")), None);
        assert_eq!(from_filename(&named("dreamshaper_8.safetensors")), None);
    }

    #[test]
    fn test_filename_controlnet_substrings() {
        for name in [
            "cannyedge_sd15.safetensors",
            "sd15mlsd.pth",
            "depthmap_v2.safetensors",
            "xl_segmentation.safetensors",
            "segmind-base.safetensors",
            "t2iadapter_seg_sd14v1.pth",
            "sd15_control_v1.pth",
        ] {
            assert_eq!(
                from_filename(&named(name)),
                Some(ModelType::ControlNet),
                "{name}"
            );
        }
        // bare "control" only counts between delimiters
        assert_eq!(from_filename(&named("control.pth")), None);
    }

    #[test]
    fn test_filename_family_order() {
        // lora family is checked before vae
        assert_eq!(
            from_filename(&named("vae_lora_mix.safetensors")),
            Some(ModelType::Lora)
        );
        assert_eq!(
            from_filename(&named("diffusion_pytorch_model.safetensors")),
            Some(ModelType::Unet)
        );
    }

    // ==================== Identifier tier ====================

    #[test]
    fn test_identifier_uses_repository_segment() {
        let evidence = ClassificationEvidence::new("x", "lllyasviel/ControlNet-v1-1");
        assert_eq!(from_identifier(&evidence), Some(ModelType::ControlNet));

        let evidence = ClassificationEvidence::new("x", "stabilityai/sd-autoencoder");
        assert_eq!(from_identifier(&evidence), Some(ModelType::Vae));

        // clip and unet are never detected at this tier
        let evidence = ClassificationEvidence::new("x", "openai/clip-vit-large");
        assert_eq!(from_identifier(&evidence), None);
    }

    // ==================== Size tier ====================

    #[test]
    fn test_size_tier_rank_tokens_extend_lora_range() {
        let evidence = named("style_dim64.safetensors")
            .with_sibling_size("style_dim64.safetensors", 300 * MIB_U64);
        assert_eq!(from_file_size(&evidence), Some(ModelType::Lora));

        let evidence =
            named("style.safetensors").with_sibling_size("style.safetensors", 300 * MIB_U64);
        assert_eq!(from_file_size(&evidence), None);
    }

    #[test]
    fn test_size_tier_requires_safetensors_for_lora() {
        let evidence = named("small.ckpt").with_sibling_size("small.ckpt", 50 * MIB_U64);
        assert_eq!(from_file_size(&evidence), None);
    }

    #[test]
    fn test_size_tier_vae_range() {
        let evidence = named("kl-f8-autoencoder.ckpt")
            .with_sibling_size("kl-f8-autoencoder.ckpt", 320 * MIB_U64);
        assert_eq!(from_file_size(&evidence), Some(ModelType::Vae));
    }

    #[test]
    fn test_size_tier_unknown_size() {
        assert_eq!(from_file_size(&named("tiny.safetensors")), None);
    }

    // ==================== Fallback ====================

    #[test]
    fn test_fallback_simple_substrings() {
        assert_eq!(fallback(&named("my-upscale.bin")), ModelType::Upscale);
        assert_eq!(fallback(&named("model.safetensors")), ModelType::Checkpoint);
    }
}
