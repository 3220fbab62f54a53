//! JWT-shape checks deciding whether a classified capture is deliverable.
//!
//! "JWT" here is purely structural: three non-empty dot-separated segments.
//! The token is never decoded or verified; the signer is the CDN's problem.

use crate::source::ManifestSource;
use regex::Regex;
use std::sync::LazyLock;

static PATH_JWT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"cloudflarestream\.com/([^/?]+)/manifest/video\.m3u8").unwrap()
});

static QUERY_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[?&]p=([^&]+)").unwrap());

/// Whether a capture can be forwarded to the ingest API or is only a
/// placeholder kept around for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureValidity {
    /// Usable immediately.
    Deliverable,
    /// Recorded but not forwarded: a Cloudflare manifest without any
    /// authorization token would 403 by the time anything consumed it.
    TokenMissing,
}

impl CaptureValidity {
    pub fn is_deliverable(&self) -> bool {
        matches!(self, Self::Deliverable)
    }
}

/// Structural JWT test: three non-empty dot-separated segments.
pub fn is_jwt_shaped(token: &str) -> bool {
    let mut parts = token.split('.');
    let shaped = parts.next().is_some_and(|s| !s.is_empty())
        && parts.next().is_some_and(|s| !s.is_empty())
        && parts.next().is_some_and(|s| !s.is_empty());
    shaped && parts.next().is_none()
}

/// True when the URL embeds a JWT as the path segment before
/// `/manifest/video.m3u8` (the durable Cloudflare form).
pub fn has_path_jwt(url: &str) -> bool {
    PATH_JWT_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .is_some_and(|m| is_jwt_shaped(m.as_str()))
}

/// True when the URL carries a JWT through the `?p=` query parameter
/// (the short-lived form players use for segment requests).
pub fn has_query_jwt(url: &str) -> bool {
    QUERY_TOKEN_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .is_some_and(|m| is_jwt_shaped(m.as_str()))
}

/// Extract the raw `p` query parameter value, JWT-shaped or not.
pub(crate) fn query_token(url: &str) -> Option<&str> {
    QUERY_TOKEN_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Decide deliverability for a classified manifest URL.
///
/// Cloudflare manifests need a JWT in either position; every other source is
/// deliverable as soon as it classified.
pub fn check_validity(source: ManifestSource, manifest_url: &str) -> CaptureValidity {
    if source != ManifestSource::Cloudflare {
        return CaptureValidity::Deliverable;
    }
    if has_path_jwt(manifest_url) || has_query_jwt(manifest_url) {
        CaptureValidity::Deliverable
    } else {
        CaptureValidity::TokenMissing
    }
}
