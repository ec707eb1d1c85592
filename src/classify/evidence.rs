//! Classification evidence gathered for one artifact.

use std::collections::{BTreeMap, BTreeSet};

use crate::hub::ModelMetadata;

/// Facts the classifier cascade reads. Built fresh per request.
///
/// Tags and labels are stored lower-cased; `filename` and `model_id` keep
/// their original spelling and are lower-cased by each strategy as needed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationEvidence {
    /// Hub tags, lower-cased.
    pub tags: BTreeSet<String>,
    /// Hub pipeline label (e.g. `text-to-image`), lower-cased.
    pub pipeline_label: Option<String>,
    /// Hub library label (e.g. `diffusers`), lower-cased.
    pub library_label: Option<String>,
    /// Repository-relative name of the target file.
    pub filename: String,
    /// Model identifier, `owner/name`.
    pub model_id: String,
    /// Declared sizes of the files in the listing, by name.
    pub sibling_sizes: BTreeMap<String, u64>,
}

impl ClassificationEvidence {
    /// Evidence carrying only a filename and model id.
    #[must_use]
    pub fn new(filename: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            model_id: model_id.into(),
            ..Self::default()
        }
    }

    /// Derives evidence from hub metadata for `filename` in `model_id`.
    #[must_use]
    pub fn collect(metadata: &ModelMetadata, filename: &str, model_id: &str) -> Self {
        let sibling_sizes = metadata
            .siblings
            .iter()
            .filter_map(|s| s.size.map(|size| (s.rfilename.clone(), size)))
            .collect();

        Self::new(filename, model_id)
            .with_tags(&metadata.tags)
            .with_optional_labels(
                metadata.pipeline_tag.as_deref(),
                metadata.library_name.as_deref(),
            )
            .with_sibling_sizes(sibling_sizes)
    }

    /// Adds tags, lower-casing them. Blank tags are dropped.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags.extend(tags.into_iter().filter_map(|t| normalize(t.as_ref())));
        self
    }

    /// Sets the pipeline label.
    #[must_use]
    pub fn with_pipeline_label(mut self, label: &str) -> Self {
        self.pipeline_label = normalize(label);
        self
    }

    /// Sets the library label.
    #[must_use]
    pub fn with_library_label(mut self, label: &str) -> Self {
        self.library_label = normalize(label);
        self
    }

    /// Records the declared size of one listed file.
    #[must_use]
    pub fn with_sibling_size(mut self, name: impl Into<String>, size: u64) -> Self {
        self.sibling_sizes.insert(name.into(), size);
        self
    }

    fn with_optional_labels(mut self, pipeline: Option<&str>, library: Option<&str>) -> Self {
        self.pipeline_label = pipeline.and_then(normalize);
        self.library_label = library.and_then(normalize);
        self
    }

    fn with_sibling_sizes(mut self, sizes: BTreeMap<String, u64>) -> Self {
        self.sibling_sizes = sizes;
        self
    }

    /// Declared size of the target file. Zero counts as unknown.
    #[must_use]
    pub fn declared_size(&self) -> Option<u64> {
        self.sibling_sizes
            .get(&self.filename)
            .copied()
            .filter(|size| *size > 0)
    }

    /// True when any tag contains `needle`.
    pub(crate) fn any_tag_contains(&self, needle: &str) -> bool {
        self.tags.iter().any(|tag| tag.contains(needle))
    }

    /// True when any tag equals one of `candidates`.
    pub(crate) fn any_tag_in(&self, candidates: &[&str]) -> bool {
        candidates.iter().any(|c| self.tags.contains(*c))
    }
}

fn normalize(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
}
