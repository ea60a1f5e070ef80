//! HLS and DASH manifest parsing.
//!
//! Both parsers share one output contract: a list of [`Stream`]s whose
//! labels come from a caller-supplied name generator, stamped with a
//! [`StreamTemplate`] (provider tag, headers, tracks). Network wrappers
//! never fail; they degrade to a single best-effort stream.

pub mod dash;
pub mod hls;

use std::collections::BTreeMap;

pub use dash::{parse_dash_manifest, resolve_dash};
pub use hls::{format_throughput, parse_hls_master, resolve_hls};

use url::Url;

use crate::http_client::HttpContext;
use crate::stream::provider::{Stream, Track};

/// Attributes shared by every stream derived from one manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamTemplate {
    pub provider_tag: String,
    /// Sent when fetching the manifest and required by the player.
    pub headers: BTreeMap<String, String>,
    /// Caller-supplied subtitles, attached verbatim and first.
    pub subtitles: Vec<Track>,
    /// Caller-supplied audio renditions, attached before parsed ones.
    pub audio_tracks: Vec<Track>,
}

impl StreamTemplate {
    pub fn new(provider_tag: impl Into<String>) -> Self {
        Self {
            provider_tag: provider_tag.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_subtitles(mut self, subtitles: Vec<Track>) -> Self {
        self.subtitles = subtitles;
        self
    }

    #[must_use]
    pub fn with_audio_tracks(mut self, audio_tracks: Vec<Track>) -> Self {
        self.audio_tracks = audio_tracks;
        self
    }

    /// Build a stream carrying this template's headers and tracks.
    pub fn stamp(&self, url: impl Into<String>, label: impl Into<String>) -> Stream {
        Stream::new(url, label, self.provider_tag.clone())
            .with_headers(self.headers.clone())
            .with_subtitles(self.subtitles.clone())
            .with_audio_tracks(self.audio_tracks.clone())
    }

    /// Like [`stamp`](Self::stamp) for a rendition that may live on another
    /// host. A template `Host` header is rewritten to the rendition's own
    /// authority.
    pub fn stamp_rendition(&self, url: impl Into<String>, label: impl Into<String>) -> Stream {
        let url = url.into();
        let mut stream = self.stamp(url.clone(), label);
        if let Some(host) = stream.required_headers.get_mut("Host") {
            if let Some(authority) = authority_of(&url) {
                *host = authority;
            }
        }
        stream
    }
}

/// Manifest format inferred from a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    Hls,
    Dash,
}

impl ManifestKind {
    /// Detect `.m3u8` / `.mpd` links, ignoring query and fragment.
    pub fn detect(url: &str) -> Option<Self> {
        let path = url
            .split(['?', '#'])
            .next()
            .unwrap_or(url)
            .to_ascii_lowercase();
        if path.ends_with(".m3u8") {
            Some(Self::Hls)
        } else if path.ends_with(".mpd") {
            Some(Self::Dash)
        } else {
            None
        }
    }
}

/// Fetch and parse a manifest of the given kind.
pub async fn resolve_manifest<F>(
    ctx: &HttpContext,
    kind: ManifestKind,
    url: &str,
    name_gen: F,
    template: &StreamTemplate,
) -> Vec<Stream>
where
    F: Fn(&str) -> String + Send + Sync,
{
    match kind {
        ManifestKind::Hls => resolve_hls(ctx, url, name_gen, template).await,
        ManifestKind::Dash => resolve_dash(ctx, url, name_gen, template).await,
    }
}

/// `host[:port]` of a URL.
pub(crate) fn authority_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Directory of a manifest URL, used as the base for relative URIs.
pub(crate) fn base_of(url: &str) -> &str {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query.rsplit_once('/').map_or("", |(base, _)| base)
}

/// Resolve a possibly relative URI against a manifest directory.
pub(crate) fn resolve_url(base: &str, relative: &str) -> String {
    if relative.starts_with("http://") || relative.starts_with("https://") {
        relative.to_string()
    } else if relative.starts_with("//") {
        // Scheme-relative
        let scheme = base.split_once("://").map_or("https", |(s, _)| s);
        format!("{scheme}:{relative}")
    } else if relative.starts_with('/') {
        // Absolute path - need to extract origin from base
        if let Some(idx) = base.find("://") {
            if let Some(end) = base[idx + 3..].find('/') {
                format!("{}{}", &base[..idx + 3 + end], relative)
            } else {
                format!("{base}{relative}")
            }
        } else {
            relative.to_string()
        }
    } else {
        format!("{base}/{relative}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = "https://cdn.example.com/hls/show";
        assert_eq!(
            resolve_url(base, "https://other.com/a.m3u8"),
            "https://other.com/a.m3u8"
        );
        assert_eq!(
            resolve_url(base, "/root/a.m3u8"),
            "https://cdn.example.com/root/a.m3u8"
        );
        assert_eq!(
            resolve_url(base, "720/index.m3u8"),
            "https://cdn.example.com/hls/show/720/index.m3u8"
        );
        assert_eq!(
            resolve_url(base, "//edge.example.com/a.m3u8"),
            "https://edge.example.com/a.m3u8"
        );
    }

    #[test]
    fn base_strips_last_segment_and_query() {
        assert_eq!(
            base_of("https://cdn/x/master.m3u8?token=a/b"),
            "https://cdn/x"
        );
        assert_eq!(base_of("https://cdn/master.m3u8"), "https://cdn");
    }

    #[test]
    fn detects_manifest_kind() {
        assert_eq!(
            ManifestKind::detect("https://cdn/master.M3U8?x=1"),
            Some(ManifestKind::Hls)
        );
        assert_eq!(
            ManifestKind::detect("https://cdn/manifest.mpd"),
            Some(ManifestKind::Dash)
        );
        assert_eq!(ManifestKind::detect("https://cdn/video.mp4"), None);
    }

    #[test]
    fn template_stamps_tracks() {
        let template = StreamTemplate::new("okru")
            .with_subtitles(vec![Track::new("s.vtt", "English")]);
        let stream = template.stamp("u", "720p");
        assert_eq!(stream.provider_tag, "okru");
        assert_eq!(stream.subtitles.len(), 1);
    }

    #[test]
    fn rendition_host_follows_its_own_authority() {
        let headers = BTreeMap::from([
            ("Host".to_string(), "master.example".to_string()),
            ("Referer".to_string(), "https://site.example/".to_string()),
        ]);
        let template = StreamTemplate::new("t").with_headers(headers);

        let stream = template.stamp_rendition("https://edge.example.com:8443/a.m3u8", "720p");
        assert_eq!(stream.required_headers["Host"], "edge.example.com:8443");
        assert_eq!(stream.required_headers["Referer"], "https://site.example/");

        let bare = StreamTemplate::new("t").stamp_rendition("https://edge.example.com/a.m3u8", "720p");
        assert!(!bare.required_headers.contains_key("Host"));
    }
}
