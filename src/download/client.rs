//! HTTP client wrapper for model transfers.
//!
//! This module provides the [`HttpClient`] struct, which owns a reqwest
//! client with redirect-following disabled so the engine can resolve the
//! effective content URL itself, hop by hop.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, LOCATION, USER_AGENT};
use reqwest::{Client, ClientBuilder, Proxy, Response, redirect};
use tracing::{debug, instrument, warn};
use url::Url;

use super::constants::{
    BODY_EXCERPT_LIMIT, CONNECT_TIMEOUT_SECS, LOGGED_URL_LIMIT, MAX_REDIRECT_HOPS,
    READ_TIMEOUT_SECS,
};
use super::error::DownloadError;
use crate::user_agent;

/// HTTP client for streaming model files.
///
/// Create once and reuse across downloads to share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

/// Result of redirect resolution: the URL that finally answered with a
/// success status, and that response, ready to be streamed.
#[derive(Debug)]
pub(crate) struct ResolvedSource {
    pub(crate) effective_url: Url,
    pub(crate) response: Response,
    pub(crate) hops: usize,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Client with a 30 s connect timeout and a 5 min idle read timeout.
    ///
    /// Redirects are never followed by reqwest itself; https traffic goes
    /// through `HTTPS_PROXY` / `https_proxy` when one is set.
    ///
    /// # Panics
    ///
    /// See [`HttpClient::with_timeouts`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Client with the given connect and idle read timeouts, in seconds.
    ///
    /// # Panics
    ///
    /// Panics if reqwest cannot initialize its TLS backend.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = base_client_builder(connect_timeout_secs, read_timeout_secs)
            .build()
            .expect("reqwest client builds with plain timeout settings");
        Self { client }
    }

    /// Resolves `url` to the response that will be streamed.
    ///
    /// Each hop is a GET with redirect-following disabled. A redirect status
    /// with a `Location` header moves to that location; a success status ends
    /// the walk; anything else is a transport failure carrying a body excerpt.
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    pub(crate) async fn resolve_source(&self, url: &str) -> Result<ResolvedSource, DownloadError> {
        let mut current =
            Url::parse(url).map_err(|_| DownloadError::invalid_url(url.to_string()))?;

        for hops in 0..=MAX_REDIRECT_HOPS {
            let response = self.send_get(current.as_str()).await?;
            let status = response.status();

            if status.is_success() {
                return Ok(ResolvedSource {
                    effective_url: current,
                    response,
                    hops,
                });
            }

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .ok_or_else(|| {
                        DownloadError::redirect(
                            current.as_str(),
                            format!("HTTP {} without a Location header", status.as_u16()),
                        )
                    })?;
                let next = current.join(location).map_err(|e| {
                    DownloadError::redirect(
                        current.as_str(),
                        format!("invalid Location header '{location}': {e}"),
                    )
                })?;
                debug!(
                    status = status.as_u16(),
                    target = %truncate_for_log(next.as_str()),
                    "following redirect"
                );
                current = next;
                continue;
            }

            let body_excerpt = read_body_excerpt(response).await;
            return Err(DownloadError::transport(
                current.as_str(),
                status.as_u16(),
                body_excerpt,
            ));
        }

        Err(DownloadError::redirect(
            url,
            format!("more than {MAX_REDIRECT_HOPS} redirects"),
        ))
    }

    async fn send_get(&self, url: &str) -> Result<Response, DownloadError> {
        self.client
            .get(url)
            .header(USER_AGENT, user_agent::download_user_agent())
            .header(ACCEPT, "*/*")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DownloadError::timeout(url)
                } else {
                    DownloadError::network(url, e)
                }
            })
    }

    /// The wrapped reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

/// Reads at most [`BODY_EXCERPT_LIMIT`] bytes of an error response body.
async fn read_body_excerpt(response: Response) -> Option<String> {
    let mut stream = response.bytes_stream();
    let mut collected: Vec<u8> = Vec::new();
    while collected.len() < BODY_EXCERPT_LIMIT {
        match stream.next().await {
            Some(Ok(chunk)) => collected.extend_from_slice(&chunk),
            Some(Err(e)) => {
                debug!(error = %e, "could not read error response body");
                break;
            }
            None => break,
        }
    }
    collected.truncate(BODY_EXCERPT_LIMIT);
    let text = String::from_utf8_lossy(&collected).trim().to_string();
    (!text.is_empty()).then_some(text)
}

pub(crate) fn truncate_for_log(url: &str) -> String {
    if url.chars().count() <= LOGGED_URL_LIMIT {
        url.to_string()
    } else {
        let head: String = url.chars().take(LOGGED_URL_LIMIT).collect();
        format!("{head}...")
    }
}

fn base_client_builder(connect_timeout_secs: u64, read_timeout_secs: u64) -> ClientBuilder {
    let builder = Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .read_timeout(Duration::from_secs(read_timeout_secs))
        .redirect(redirect::Policy::none());
    apply_env_proxy(builder.no_proxy())
}

/// Routes https traffic through `HTTPS_PROXY` / `https_proxy` when set.
pub(crate) fn apply_env_proxy(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_https_proxy() {
        match Proxy::https(&proxy) {
            Ok(resolved) => {
                debug!(proxy = %proxy, "using HTTPS proxy");
                builder = builder.proxy(resolved);
            }
            Err(e) => warn!(proxy = %proxy, error = %e, "ignoring unparseable HTTPS proxy"),
        }
    }
    builder
}

fn env_https_proxy() -> Option<String> {
    find_first_proxy_var(&["HTTPS_PROXY", "https_proxy"])
}

fn find_first_proxy_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
