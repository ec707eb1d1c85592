//! Hub model metadata as returned by `GET /api/models/{id}`.

use serde::{Deserialize, Deserializer};

/// The subset of the hub's model document this crate reads.
///
/// Every field tolerates being absent or `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ModelMetadata {
    /// Files in the repository.
    #[serde(default, deserialize_with = "null_as_default")]
    pub siblings: Vec<SiblingFile>,
    /// Free-form tags (`lora`, `stable-diffusion`, ...).
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    /// Task label such as `text-to-image`.
    #[serde(default)]
    pub pipeline_tag: Option<String>,
    /// Library label such as `diffusers`.
    #[serde(default)]
    pub library_name: Option<String>,
    /// Model card summary, when the hub provides one.
    #[serde(default)]
    pub description: Option<String>,
}

/// One file in a repository listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SiblingFile {
    /// Repository-relative path, e.g. `vae/diffusion_pytorch_model.safetensors`.
    #[serde(default)]
    pub rfilename: String,
    /// Size in bytes. Only present when the listing was requested with blobs.
    #[serde(default)]
    pub size: Option<u64>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
