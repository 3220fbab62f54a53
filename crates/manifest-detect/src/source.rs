use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform (or generic protocol) a manifest URL was attributed to.
///
/// The string forms are part of the ingest wire format, so the serde
/// representation is fixed to lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestSource {
    Cloudflare,
    Vimeo,
    Youtube,
    Jwplayer,
    Pandavideo,
    Hls,
    Dash,
    Unknown,
}

impl ManifestSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cloudflare => "cloudflare",
            Self::Vimeo => "vimeo",
            Self::Youtube => "youtube",
            Self::Jwplayer => "jwplayer",
            Self::Pandavideo => "pandavideo",
            Self::Hls => "hls",
            Self::Dash => "dash",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ManifestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
