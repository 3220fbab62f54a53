//! Page-URL canonicalization and related guards.
//!
//! Two tabs showing the same video must map to the same capture key, so the
//! noisy query parameters some sites append are stripped before the URL is
//! used anywhere.

use url::Url;

/// Canonicalize a page URL for use as the capture/debounce key.
///
/// YouTube watch pages reduce to `https://www.youtube.com/watch?v=<id>`,
/// Vimeo pages drop query and fragment, everything else (and anything that
/// fails to parse) passes through unchanged.
pub fn canonical_page_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let host = parsed.host_str().unwrap_or_default();

    if host.contains("youtube.com") && parsed.path() == "/watch" {
        if let Some(id) = parsed
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned())
        {
            return format!("https://www.youtube.com/watch?v={id}");
        }
    }

    if host.contains("vimeo.com") {
        return format!("{}://{}{}", parsed.scheme(), host, parsed.path());
    }

    url.to_string()
}

/// True when the page itself is a manifest (someone opened the `.m3u8`
/// directly); capturing those would just echo the page back.
pub fn page_is_manifest(page_url: &str) -> bool {
    page_url.contains(".m3u8")
        || page_url.contains(".mpd")
        || page_url.contains("cloudflarestream.com/manifest")
}

/// Hostname of a URL, falling back to best-effort string slicing when the
/// URL does not parse.
pub fn domain_of(url: &str) -> String {
    if let Ok(parsed) = Url::parse(url)
        && let Some(host) = parsed.host_str()
    {
        return host.to_string();
    }
    url.split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or(url)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn youtube_watch_reduces_to_video_id() {
        assert_eq!(
            canonical_page_url("https://www.youtube.com/watch?v=abc123&t=42s&list=PL9"),
            "https://www.youtube.com/watch?v=abc123"
        );
    }

    #[test]
    fn vimeo_drops_query_and_fragment() {
        assert_eq!(
            canonical_page_url("https://vimeo.com/12345?share=copy#t=10"),
            "https://vimeo.com/12345"
        );
    }

    #[test]
    fn other_pages_pass_through() {
        let url = "https://school.example.com/course/lesson-3?unit=2";
        assert_eq!(canonical_page_url(url), url);
        assert_eq!(canonical_page_url("not a url"), "not a url");
    }

    #[test]
    fn manifest_pages_are_detected() {
        assert!(page_is_manifest("https://cdn.test/vod/master.m3u8"));
        assert!(page_is_manifest(
            "https://x.cloudflarestream.com/manifest/video.m3u8"
        ));
        assert!(!page_is_manifest("https://site.test/watch"));
    }

    #[test]
    fn domain_extraction_with_fallback() {
        assert_eq!(domain_of("https://site.test/watch?x=1"), "site.test");
        assert_eq!(domain_of("weird://host.test/thing"), "host.test");
    }
}
