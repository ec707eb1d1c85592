//! Shared User-Agent strings for download and hub API HTTP clients.

/// User-Agent sent on file transfers. The hub's CDN serves large files to
/// curl-style clients without extra negotiation.
const DOWNLOAD_USER_AGENT: &str = "curl/8.7.1";

/// User-Agent for file transfer requests.
#[must_use]
pub(crate) fn download_user_agent() -> &'static str {
    DOWNLOAD_USER_AGENT
}

/// User-Agent for hub metadata requests (identifies the tool and version).
#[must_use]
pub(crate) fn hub_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("comfyfetch/{version}")
}
