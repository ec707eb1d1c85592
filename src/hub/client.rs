//! Hub API client: metadata fetch, file resolution and classification.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use tracing::{info, instrument, warn};

use super::error::ResolveError;
use super::metadata::ModelMetadata;
use super::resolve::{FileLocation, RemoteFileDescriptor, describe, encode_path};
use crate::classify::{ClassificationEvidence, ModelType, Tier, classify_with_tier};
use crate::download::apply_env_proxy;
use crate::download::constants::CONNECT_TIMEOUT_SECS;
use crate::user_agent;

/// Public Hugging Face Hub.
pub const DEFAULT_HUB_ENDPOINT: &str = "https://huggingface.co";

/// Branch files are resolved against by default.
pub const DEFAULT_REVISION: &str = "main";

/// Total timeout of the primary metadata request.
const PRIMARY_TIMEOUT: Duration = Duration::from_secs(60);

/// Total timeout of the fallback metadata request.
const FALLBACK_TIMEOUT: Duration = Duration::from_secs(30);

/// Hub location and request timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Base URL, e.g. `https://huggingface.co`.
    pub endpoint: String,
    /// Branch, tag or commit files are downloaded from.
    pub revision: String,
    /// Connect timeout for both metadata clients.
    pub connect_timeout: Duration,
    /// Total timeout of the primary request.
    pub primary_timeout: Duration,
    /// Total timeout of the fallback request.
    pub fallback_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_HUB_ENDPOINT.to_string(),
            revision: DEFAULT_REVISION.to_string(),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            primary_timeout: PRIMARY_TIMEOUT,
            fallback_timeout: FALLBACK_TIMEOUT,
        }
    }
}

impl HubConfig {
    /// Config pointing at `endpoint`, other values default.
    #[must_use]
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }
}

/// A resolved and classified remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    /// The file to download.
    pub descriptor: RemoteFileDescriptor,
    /// Its functional type.
    pub model_type: ModelType,
    /// Which classifier tier decided the type.
    pub tier: Tier,
    /// Model card summary, if the hub has one.
    pub description: Option<String>,
}

/// Client for the hub's model API.
///
/// Holds two HTTP clients: metadata is requested with the primary one and,
/// on any failure, once more with the fallback (HTTP/1.1 only, uncompressed,
/// shorter timeout).
#[derive(Debug, Clone)]
pub struct HubClient {
    primary: Client,
    fallback: Client,
    config: HubConfig,
}

impl Default for HubClient {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl HubClient {
    /// Creates a hub client.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static TLS and proxy
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(config: HubConfig) -> Self {
        let primary = apply_env_proxy(
            Client::builder()
                .connect_timeout(config.connect_timeout)
                .timeout(config.primary_timeout)
                .gzip(true)
                .no_proxy(),
        )
        .build()
        .expect("failed to build primary hub client");

        let fallback = apply_env_proxy(
            Client::builder()
                .connect_timeout(config.connect_timeout)
                .timeout(config.fallback_timeout)
                .http1_only()
                .no_gzip()
                .no_proxy(),
        )
        .build()
        .expect("failed to build fallback hub client");

        Self {
            primary,
            fallback,
            config,
        }
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Fetches the metadata document of `model_id`.
    ///
    /// # Errors
    ///
    /// [`ResolveError::InvalidModelId`] for a malformed id (no request is
    /// made); [`ResolveError::Metadata`] when both clients fail.
    #[instrument(skip(self))]
    pub async fn fetch_model_info(&self, model_id: &str) -> Result<ModelMetadata, ResolveError> {
        validate_model_id(model_id)?;
        let url = format!(
            "{}/api/models/{}?blobs=true",
            self.config.endpoint.trim_end_matches('/'),
            encode_path(model_id)
        );

        match fetch_json(&self.primary, &url).await {
            Ok(metadata) => Ok(metadata),
            Err(primary_error) => {
                warn!(url = %url, error = %primary_error, "metadata request failed, retrying with fallback client");
                fetch_json(&self.fallback, &url)
                    .await
                    .map_err(|reason| ResolveError::metadata(url.clone(), reason))
            }
        }
    }

    /// Fetches metadata and selects the file to download.
    ///
    /// # Errors
    ///
    /// Any error of [`HubClient::fetch_model_info`], plus
    /// [`ResolveError::NotFound`] and [`ResolveError::NoSuitableFile`].
    pub async fn resolve(
        &self,
        model_id: &str,
        filename: Option<&str>,
    ) -> Result<(RemoteFileDescriptor, ModelMetadata), ResolveError> {
        let metadata = self.fetch_model_info(model_id).await?;
        let descriptor = describe(&metadata, model_id, filename, self.location())?;
        Ok((descriptor, metadata))
    }

    /// Resolves the file to download and classifies it.
    ///
    /// # Errors
    ///
    /// See [`HubClient::resolve`].
    #[instrument(skip(self))]
    pub async fn resolve_and_classify(
        &self,
        model_id: &str,
        filename: Option<&str>,
    ) -> Result<ResolvedModel, ResolveError> {
        let (descriptor, metadata) = self.resolve(model_id, filename).await?;
        let evidence = ClassificationEvidence::collect(&metadata, &descriptor.name, model_id);
        let classification = classify_with_tier(&evidence);

        info!(
            file = %descriptor.name,
            size = descriptor.byte_size,
            model_type = %classification.model_type,
            tier = ?classification.tier,
            "resolved model"
        );

        Ok(ResolvedModel {
            descriptor,
            model_type: classification.model_type,
            tier: classification.tier,
            description: metadata.description,
        })
    }

    fn location(&self) -> FileLocation<'_> {
        FileLocation {
            endpoint: &self.config.endpoint,
            revision: &self.config.revision,
        }
    }
}

async fn fetch_json(client: &Client, url: &str) -> Result<ModelMetadata, String> {
    let response = client
        .get(url)
        .header(ACCEPT, "application/json")
        .header(USER_AGENT, user_agent::hub_user_agent())
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {}", status.as_u16()));
    }

    response
        .json::<ModelMetadata>()
        .await
        .map_err(|e| format!("invalid metadata document: {e}"))
}

/// Checks that `model_id` looks like `owner/name` or `name`.
///
/// # Errors
///
/// [`ResolveError::InvalidModelId`] describing the first problem found.
pub fn validate_model_id(model_id: &str) -> Result<(), ResolveError> {
    let reason = if model_id.trim().is_empty() {
        Some("model id is empty")
    } else if model_id.chars().any(char::is_whitespace) {
        Some("model id contains whitespace")
    } else if model_id.split('/').count() > 2 {
        Some("expected 'owner/name'")
    } else if model_id.split('/').any(str::is_empty) {
        Some("model id has an empty path segment")
    } else if model_id.split('/').any(|s| s == "." || s == "..") {
        Some("model id has a relative path segment")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ResolveError::invalid_model_id(model_id, reason)),
        None => Ok(()),
    }
}
