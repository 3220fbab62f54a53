//! Manifest URL canonicalization.
//!
//! The only non-trivial rewrite is Cloudflare's query-token form: players
//! request `…/manifest/video.m3u8?p=<jwt>`, but the path-embedded form
//! `<host>/<jwt>/manifest/video.m3u8` is strictly more durable, so a
//! JWT-shaped `p` token gets lifted into the path. Everything else is
//! trimming. The whole function is idempotent.

use crate::validity::is_jwt_shaped;
use regex::Regex;
use std::sync::LazyLock;

static CF_QUERY_FORM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"cloudflarestream\.com/[^?]+/manifest/video\.m3u8\?p=([^&]+)").unwrap()
});

/// Canonicalize a raw candidate manifest URL.
pub fn normalize_manifest_url(raw: &str) -> String {
    // Backticks show up when URLs travel through chat/markdown copy-paste.
    let url: String = raw.trim().chars().filter(|&c| c != '`').collect();

    if !url.contains("cloudflarestream.com") {
        return url;
    }

    let Some(token) = CF_QUERY_FORM_RE
        .captures(&url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
    else {
        return url;
    };

    if !is_jwt_shaped(&token) {
        // Opaque `p` tokens stay where the player put them.
        return url;
    }

    // scheme://host, dropping the old path and query entirely.
    let host = url
        .split("/manifest/")
        .next()
        .unwrap_or(&url)
        .splitn(4, '/')
        .take(3)
        .collect::<Vec<_>>()
        .join("/");

    format!("{host}/{token}/manifest/video.m3u8")
}
