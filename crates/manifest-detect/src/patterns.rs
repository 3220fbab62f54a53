//! Extension-style URL match patterns.
//!
//! The observation feed is pre-filtered by a configured set of match globs
//! (`*://*.cloudflarestream.com/*`, `*://*/*.m3u8*`, …). Each glob compiles
//! to an anchored regex where `*` matches any run of characters.

use regex::Regex;
use tracing::warn;

/// Default watch set: the platforms the classifier knows about plus the
/// generic manifest extensions.
pub const DEFAULT_PATTERNS: &[&str] = &[
    "*://*.cloudflarestream.com/*",
    "*://*.pandavideo.com.br/*",
    "*://*.vimeo.com/*",
    "*://*.vimeocdn.com/*",
    "*://*.youtube.com/*",
    "*://*.googlevideo.com/*",
    "*://*.jwplatform.com/*",
    "*://*.jwpcdn.com/*",
    "*://*/*.m3u8*",
    "*://*/*.mpd*",
];

/// Compiled set of watch globs.
#[derive(Debug, Clone)]
pub struct WatchList {
    patterns: Vec<Regex>,
}

impl WatchList {
    /// Compile a set of glob patterns, skipping (and logging) any that fail
    /// to compile rather than refusing the whole list.
    pub fn new<S: AsRef<str>>(globs: &[S]) -> Self {
        let patterns = globs
            .iter()
            .filter_map(|g| {
                let g = g.as_ref();
                match Regex::new(&glob_to_regex(g)) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!(pattern = g, error = %e, "skipping unparseable watch pattern");
                        None
                    }
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn matches(&self, url: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(url))
    }
}

impl Default for WatchList {
    fn default() -> Self {
        Self::new(DEFAULT_PATTERNS)
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push('^');
    for c in glob.chars() {
        match c {
            '*' => out.push_str(".*"),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    out
}
