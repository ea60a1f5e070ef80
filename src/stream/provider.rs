//! Source records, classified servers, resolved streams, and the extractor
//! trait that turns one into the other.
//!
//! A [`HosterExtractor`] knows how to turn a [`ClassifiedServer`] of one
//! [`ProviderCategory`] into zero or more playable [`Stream`]s.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::http_client::HttpContext;

/// One raw source entry returned by the upstream content API for an episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRecord {
    /// Possibly obfuscated source URL. Empty URLs never produce streams.
    #[serde(default)]
    pub raw_url: String,
    /// Free-text label from upstream (e.g., `"Luf-mp4"`, `"Vidstreaming"`).
    #[serde(default)]
    pub provider_name: String,
    /// Upstream type tag (e.g., `"player"`, `"iframe"`).
    #[serde(default)]
    pub kind: String,
    /// Upstream tie-break weight; higher is more preferred.
    #[serde(default)]
    pub priority: f64,
}

impl SourceRecord {
    pub fn new(
        raw_url: impl Into<String>,
        provider_name: impl Into<String>,
        kind: impl Into<String>,
        priority: f64,
    ) -> Self {
        Self {
            raw_url: raw_url.into(),
            provider_name: provider_name.into(),
            kind: kind.into(),
            priority,
        }
    }
}

/// Third-party hosters recognized by URL pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamedHoster {
    Vidstreaming,
    Doodstream,
    Okru,
    Mp4upload,
    Streamlare,
    Filemoon,
    Streamwish,
    Megacloud,
}

impl NamedHoster {
    /// All hosters in classification order.
    pub const ALL: [NamedHoster; 8] = [
        NamedHoster::Vidstreaming,
        NamedHoster::Doodstream,
        NamedHoster::Okru,
        NamedHoster::Mp4upload,
        NamedHoster::Streamlare,
        NamedHoster::Filemoon,
        NamedHoster::Streamwish,
        NamedHoster::Megacloud,
    ];

    /// Lowercase key used in `enabled_providers`.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            NamedHoster::Vidstreaming => "vidstreaming",
            NamedHoster::Doodstream => "doodstream",
            NamedHoster::Okru => "okru",
            NamedHoster::Mp4upload => "mp4upload",
            NamedHoster::Streamlare => "streamlare",
            NamedHoster::Filemoon => "filemoon",
            NamedHoster::Streamwish => "streamwish",
            NamedHoster::Megacloud => "megacloud",
        }
    }

    /// URL substrings identifying this hoster.
    #[must_use]
    pub fn url_patterns(self) -> &'static [&'static str] {
        match self {
            NamedHoster::Vidstreaming => &[
                "vidstreaming",
                "https://gogo",
                "playgo1.cc",
                "playtaku",
                "vidcloud",
            ],
            NamedHoster::Doodstream => &["dood"],
            NamedHoster::Okru => &["ok.ru", "okru"],
            NamedHoster::Mp4upload => &["mp4upload.com"],
            NamedHoster::Streamlare => &["streamlare.com"],
            NamedHoster::Filemoon => &["filemoon", "moonplayer"],
            NamedHoster::Streamwish => &["wish"],
            NamedHoster::Megacloud => &["megacloud."],
        }
    }
}

impl fmt::Display for NamedHoster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Category a source record resolves to during classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "name")]
pub enum ProviderCategory {
    /// Served from the content site's own internal API.
    Internal,
    /// Upstream `player` entries, already direct links.
    Player,
    /// A recognized third-party hoster.
    NamedProvider(NamedHoster),
    /// No rule matched; dropped before scheduling.
    Unmatched,
}

impl fmt::Display for ProviderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderCategory::Internal => f.write_str("internal"),
            ProviderCategory::Player => f.write_str("player"),
            ProviderCategory::NamedProvider(hoster) => write!(f, "{hoster}"),
            ProviderCategory::Unmatched => f.write_str("unmatched"),
        }
    }
}

/// A source record annotated with its resolved category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedServer {
    /// URL after XOR decoding (equal to the raw URL when not obfuscated).
    pub decoded_url: String,
    pub category: ProviderCategory,
    pub priority: f64,
    /// Upstream provider label, carried for stream naming.
    pub provider_name: String,
}

/// A subtitle or audio rendition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub url: String,
    pub label: String,
}

impl Track {
    pub fn new(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
        }
    }
}

/// One directly playable rendition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    pub url: String,
    /// Human-readable label, e.g. `"1080p (Server - Dash)"`.
    pub quality_label: String,
    /// Headers a player must send when fetching `url`.
    #[serde(default)]
    pub required_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub subtitles: Vec<Track>,
    #[serde(default)]
    pub audio_tracks: Vec<Track>,
    /// Extractor that produced the stream (e.g., `"okru"`).
    pub provider_tag: String,
}

impl Stream {
    pub fn new(
        url: impl Into<String>,
        quality_label: impl Into<String>,
        provider_tag: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            quality_label: quality_label.into(),
            required_headers: BTreeMap::new(),
            subtitles: Vec::new(),
            audio_tracks: Vec::new(),
            provider_tag: provider_tag.into(),
        }
    }

    #[must_use]
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.required_headers = headers;
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
}

/// Provider name meaning "no explicit hoster preference".
pub const DEFAULT_PROVIDER: &str = "default";

/// Ranking and filtering preferences supplied with each request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    /// Hoster name to favor, or `"default"` to trust upstream priority.
    pub preferred_provider_name: String,
    /// Substring matched against quality labels (e.g., `"1080"`).
    pub preferred_quality_token: String,
    /// Substring matched against quality labels (e.g., `"sub"`, `"dub"`).
    pub preferred_language_token: String,
    /// Lowercase provider keys allowed to be dispatched.
    pub enabled_providers: BTreeSet<String>,
}

impl UserPreferences {
    /// Whether no explicit hoster preference is set.
    ///
    /// `site_default` is accepted as an alias.
    #[must_use]
    pub fn uses_default_provider(&self) -> bool {
        let name = self.preferred_provider_name.trim().to_lowercase();
        name.is_empty() || name == DEFAULT_PROVIDER || name == "site_default"
    }

    #[must_use]
    pub fn is_enabled(&self, key: &str) -> bool {
        self.enabled_providers.contains(key)
    }
}

impl Default for UserPreferences {
    fn default() -> Self {
        let enabled = [
            "default", "ac", "ak", "kir", "luf-mp4", "si-hls", "s-mp4", "ac-hls", "player",
            "vidstreaming", "okru", "mp4upload", "streamlare", "doodstream", "filemoon",
            "streamwish", "megacloud",
        ];
        Self {
            preferred_provider_name: DEFAULT_PROVIDER.to_string(),
            preferred_quality_token: "1080".to_string(),
            preferred_language_token: "sub".to_string(),
            enabled_providers: enabled.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// Trait for per-hoster stream extractors.
///
/// Implementors only write [`try_extract`](Self::try_extract); the provided
/// [`extract`](Self::extract) absorbs every failure so that one broken
/// hoster never affects its siblings.
#[async_trait]
pub trait HosterExtractor: Send + Sync {
    /// Short lowercase extractor name, used as [`Stream::provider_tag`].
    fn name(&self) -> &'static str;

    /// Produce streams for one classified server.
    async fn try_extract(&self, server: &ClassifiedServer, ctx: &HttpContext)
        -> Result<Vec<Stream>>;

    /// Produce streams, logging and discarding any error.
    async fn extract(&self, server: &ClassifiedServer, ctx: &HttpContext) -> Vec<Stream> {
        match self.try_extract(server, ctx).await {
            Ok(streams) => streams,
            Err(e) => {
                warn!(
                    extractor = self.name(),
                    url = %server.decoded_url,
                    "extraction failed: {e:#}"
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_record_deserializes_camel_case() {
        let record: SourceRecord = serde_json::from_str(
            r#"{"rawUrl":"-38","providerName":"Ac","kind":"internal","priority":2.0}"#,
        )
        .unwrap();
        assert_eq!(record, SourceRecord::new("-38", "Ac", "internal", 2.0));
    }

    #[test]
    fn source_record_tolerates_missing_fields() {
        let record: SourceRecord = serde_json::from_str(r#"{"providerName":"Ok"}"#).unwrap();
        assert!(record.raw_url.is_empty());
        assert!(record.priority.abs() < f64::EPSILON);
    }

    #[test]
    fn default_provider_aliases() {
        let mut prefs = UserPreferences::default();
        assert!(prefs.uses_default_provider());
        prefs.preferred_provider_name = "Site_Default".to_string();
        assert!(prefs.uses_default_provider());
        prefs.preferred_provider_name = "okru".to_string();
        assert!(!prefs.uses_default_provider());
    }

    #[test]
    fn named_hoster_keys_are_unique() {
        let keys: BTreeSet<_> = NamedHoster::ALL.iter().map(|h| h.key()).collect();
        assert_eq!(keys.len(), NamedHoster::ALL.len());
    }

    #[test]
    fn category_display() {
        assert_eq!(ProviderCategory::Internal.to_string(), "internal");
        assert_eq!(
            ProviderCategory::NamedProvider(NamedHoster::Okru).to_string(),
            "okru"
        );
    }

    #[test]
    fn stream_builder_sets_tracks() {
        let stream = Stream::new("u", "720p", "okru")
            .with_subtitles(vec![Track::new("s", "English")])
            .with_audio_tracks(vec![Track::new("a", "Japanese")]);
        assert_eq!(stream.subtitles[0].label, "English");
        assert_eq!(stream.audio_tracks[0].url, "a");
    }
}
