//! Ordered URL classification.
//!
//! A single request URL can satisfy several of the looser rules at once
//! (every Cloudflare JWT manifest is also a generic `.m3u8` hit), so the
//! rules form a strict priority cascade: the first match wins and later
//! rules are never consulted. The more specific signal must win because the
//! weaker forms carry authorization tokens that expire before anything
//! downstream gets to use them.

use crate::source::ManifestSource;
use crate::validity::{is_jwt_shaped, query_token};
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;
use tracing::debug;

static CF_PATH_JWT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"cloudflarestream\.com/(eyJ[^/?]+)/manifest/video\.m3u8").unwrap()
});

/// Outcome of classification: the attributed platform plus the candidate
/// manifest URL. For most rules the candidate is the request URL as-is;
/// segment and PandaVideo rules derive a different one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedManifest {
    pub source: ManifestSource,
    pub manifest_url: String,
}

impl ClassifiedManifest {
    fn passthrough(source: ManifestSource, url: &str) -> Self {
        Self {
            source,
            manifest_url: url.to_string(),
        }
    }
}

type RuleFn = fn(&str) -> Option<ClassifiedManifest>;

struct Rule {
    name: &'static str,
    matcher: RuleFn,
}

// Priority-ordered registry; first hit short-circuits.
static RULES: &[Rule] = &[
    Rule { name: "cloudflare-jwt-path", matcher: cloudflare_jwt_path },
    Rule { name: "cloudflare-m3u8", matcher: cloudflare_m3u8 },
    Rule { name: "cloudflare-segment", matcher: cloudflare_segment },
    Rule { name: "vimeo", matcher: vimeo },
    Rule { name: "youtube", matcher: youtube },
    Rule { name: "jwplayer", matcher: jwplayer },
    Rule { name: "pandavideo", matcher: pandavideo },
    Rule { name: "generic-hls", matcher: generic_hls },
    Rule { name: "generic-dash", matcher: generic_dash },
];

/// Classify a request URL against the priority cascade.
///
/// Returns `None` for anything that does not look like a playable manifest
/// (a classification miss, not an error).
pub fn classify(url: &str) -> Option<ClassifiedManifest> {
    for rule in RULES {
        if let Some(hit) = (rule.matcher)(url) {
            debug!(rule = rule.name, source = %hit.source, "request matched manifest rule");
            return Some(hit);
        }
    }
    None
}

/// Rule 1: signed JWT embedded in the manifest path, the most durable form.
fn cloudflare_jwt_path(url: &str) -> Option<ClassifiedManifest> {
    if !url.contains("cloudflarestream.com") || !url.contains("/manifest/video.m3u8") {
        return None;
    }
    let token = CF_PATH_JWT_RE.captures(url)?.get(1)?;
    is_jwt_shaped(token.as_str())
        .then(|| ClassifiedManifest::passthrough(ManifestSource::Cloudflare, url))
}

/// Rule 2: any other Cloudflare Stream `.m3u8` (token may live in the query).
fn cloudflare_m3u8(url: &str) -> Option<ClassifiedManifest> {
    (url.contains("cloudflarestream.com") && url.contains(".m3u8"))
        .then(|| ClassifiedManifest::passthrough(ManifestSource::Cloudflare, url))
}

/// Rule 3: a `.ts` media segment under `/video/`; rebuild the manifest URL
/// from the segment's base and carry over the `p` token when present.
fn cloudflare_segment(url: &str) -> Option<ClassifiedManifest> {
    if !url.contains("cloudflarestream.com") || !url.contains("/video/") || !url.contains(".ts") {
        return None;
    }
    let base = url.split("/video/").next()?;
    let manifest_url = match query_token(url) {
        Some(token) => format!("{base}/manifest/video.m3u8?p={token}"),
        None => format!("{base}/manifest/video.m3u8"),
    };
    Some(ClassifiedManifest {
        source: ManifestSource::Cloudflare,
        manifest_url,
    })
}

/// Rule 4: Vimeo player CDN, both the legacy `master.json` and HLS forms.
fn vimeo(url: &str) -> Option<ClassifiedManifest> {
    let host = url.contains("vimeo.com") || url.contains("vimeocdn.com");
    (host && (url.contains("master.json") || url.contains(".m3u8")))
        .then(|| ClassifiedManifest::passthrough(ManifestSource::Vimeo, url))
}

/// Rule 5: googlevideo playback endpoints.
fn youtube(url: &str) -> Option<ClassifiedManifest> {
    let host = url.contains("googlevideo.com");
    (host && (url.contains("videoplayback") || url.contains(".m3u8")))
        .then(|| ClassifiedManifest::passthrough(ManifestSource::Youtube, url))
}

/// Rule 6: JWPlayer CDN, HLS or DASH.
fn jwplayer(url: &str) -> Option<ClassifiedManifest> {
    let host = url.contains("jwplatform.com") || url.contains("jwpcdn.com");
    (host && (url.contains(".m3u8") || url.contains(".mpd")))
        .then(|| ClassifiedManifest::passthrough(ManifestSource::Jwplayer, url))
}

/// Rule 7: PandaVideo. `get_qualities` requests only enumerate renditions and
/// must be rejected outright (no fallthrough to the generic HLS rule); the
/// real stream URL is accepted with its query stripped.
fn pandavideo(url: &str) -> Option<ClassifiedManifest> {
    if !url.contains("pandavideo.com.br") || !url.contains(".m3u8") {
        return None;
    }
    if url.contains("get_qualities=") {
        debug!("ignoring PandaVideo quality-listing request");
        return None;
    }
    let clean: Cow<'_, str> = match url.split_once('?') {
        Some((head, _)) => Cow::Borrowed(head),
        None => Cow::Borrowed(url),
    };
    Some(ClassifiedManifest {
        source: ManifestSource::Pandavideo,
        manifest_url: clean.into_owned(),
    })
}

/// Rule 8: generic HLS from any domain, minus known non-video playlists.
fn generic_hls(url: &str) -> Option<ClassifiedManifest> {
    if !url.contains(".m3u8") || url.contains("localhost") {
        return None;
    }
    if url.contains("audio") || url.contains("thumb") || url.contains("sprite") {
        return None;
    }
    Some(ClassifiedManifest::passthrough(ManifestSource::Hls, url))
}

/// Rule 9: generic DASH.
fn generic_dash(url: &str) -> Option<ClassifiedManifest> {
    (url.contains(".mpd") && !url.contains("localhost"))
        .then(|| ClassifiedManifest::passthrough(ManifestSource::Dash, url))
}
