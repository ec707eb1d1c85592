//! Choosing which repository file to download.
//!
//! Selection is pure: it runs over an already-fetched listing and never
//! touches the network.

use std::sync::LazyLock;

use regex::RegexSet;
use tracing::debug;

use super::error::ResolveError;
use super::metadata::{ModelMetadata, SiblingFile};

/// Naming conventions of a repository's primary weights file.
#[allow(clippy::expect_used)]
static MAIN_MODEL_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"^v\d+-\d+-pruned.*\.(safetensors|ckpt)$", // v1-5-pruned-emaonly.safetensors
        r"^.*-v\d+.*\.(safetensors|ckpt)$",         // model-v1.5.safetensors
        r"^model\.(safetensors|ckpt)$",
        r"^.*\d+px.*\.(safetensors|ckpt)$", // playground-v2.5-1024px-aesthetic.fp16.safetensors
    ])
    .expect("main model patterns are valid") // Static pattern, safe to panic
});

/// Pipeline components that are never the primary weights file.
const COMPONENT_MARKERS: [&str; 3] = ["safety_checker", "text_encoder", "feature_extractor"];

/// A concrete remote file, ready to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileDescriptor {
    /// Repository-relative name. Never empty.
    pub name: String,
    /// Declared size in bytes; `0` when the listing did not say.
    pub byte_size: u64,
    /// Absolute URL the file is served from.
    pub download_url: String,
}

/// Where resolved files are served from.
#[derive(Debug, Clone, Copy)]
pub struct FileLocation<'a> {
    /// Hub base URL, without trailing slash.
    pub endpoint: &'a str,
    /// Branch, tag or commit.
    pub revision: &'a str,
}

/// Picks the file to download from `metadata` and describes it.
///
/// # Errors
///
/// [`ResolveError::NotFound`] when `filename` is given and not listed;
/// [`ResolveError::NoSuitableFile`] when the listing is empty.
pub fn describe(
    metadata: &ModelMetadata,
    model_id: &str,
    filename: Option<&str>,
    location: FileLocation<'_>,
) -> Result<RemoteFileDescriptor, ResolveError> {
    let file = select_file(&metadata.siblings, model_id, filename)?;
    Ok(RemoteFileDescriptor {
        name: file.rfilename.clone(),
        byte_size: file.size.unwrap_or(0),
        download_url: download_url(location, model_id, &file.rfilename),
    })
}

/// Selects a file from a repository listing.
///
/// With an explicit `filename`, only an exact match is accepted. Otherwise
/// root-level primary weights (pruned, versioned, `model.*`, `NNNpx`) come first,
/// then any root-level `.safetensors`/`.ckpt`, ranked pruned `.safetensors`,
/// `.safetensors`, pruned `.ckpt`, `.ckpt`. An empty candidate set falls back
/// to the first listed file.
///
/// # Errors
///
/// See [`describe`].
pub fn select_file<'a>(
    siblings: &'a [SiblingFile],
    model_id: &str,
    filename: Option<&str>,
) -> Result<&'a SiblingFile, ResolveError> {
    let listed: Vec<&SiblingFile> = siblings
        .iter()
        .filter(|s| !s.rfilename.is_empty())
        .collect();

    let Some(first) = listed.first().copied() else {
        return Err(ResolveError::no_suitable_file(model_id));
    };

    if let Some(wanted) = filename {
        return listed
            .iter()
            .copied()
            .find(|s| s.rfilename == wanted)
            .ok_or_else(|| ResolveError::not_found(model_id, wanted));
    }

    let main_files: Vec<&SiblingFile> = listed
        .iter()
        .copied()
        .filter(|s| is_root_level(&s.rfilename))
        .filter(|s| !COMPONENT_MARKERS.iter().any(|m| s.rfilename.contains(m)))
        .filter(|s| MAIN_MODEL_PATTERNS.is_match(&s.rfilename))
        .collect();

    let candidates = if main_files.is_empty() {
        listed
            .iter()
            .copied()
            .filter(|s| is_root_level(&s.rfilename) && is_weights_file(&s.rfilename))
            .collect()
    } else {
        main_files
    };

    let selected = rank_candidates(&candidates).unwrap_or(first);
    debug!(
        model_id,
        selected = %selected.rfilename,
        candidates = candidates.len(),
        "selected model file"
    );
    Ok(selected)
}

fn rank_candidates<'a>(candidates: &[&'a SiblingFile]) -> Option<&'a SiblingFile> {
    let find = |pruned: bool, ext: &'static str| {
        candidates
            .iter()
            .copied()
            .find(|s| s.rfilename.ends_with(ext) && (!pruned || s.rfilename.contains("pruned")))
    };
    find(true, ".safetensors")
        .or_else(|| find(false, ".safetensors"))
        .or_else(|| find(true, ".ckpt"))
        .or_else(|| find(false, ".ckpt"))
        .or_else(|| candidates.first().copied())
}

fn is_root_level(name: &str) -> bool {
    !name.contains('/')
}

fn is_weights_file(name: &str) -> bool {
    name.ends_with(".safetensors") || name.ends_with(".ckpt")
}

/// `{endpoint}/{model_id}/resolve/{revision}/{name}`, percent-encoding each
/// path segment.
pub(crate) fn download_url(location: FileLocation<'_>, model_id: &str, name: &str) -> String {
    format!(
        "{}/{}/resolve/{}/{}",
        location.endpoint.trim_end_matches('/'),
        encode_path(model_id),
        urlencoding::encode(location.revision),
        encode_path(name)
    )
}

/// Percent-encodes each `/`-separated segment of `path`.
pub(crate) fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
