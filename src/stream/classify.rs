//! Hoster classification.
//!
//! Rules are evaluated in order and the first match wins:
//!
//! 1. Internal API path + internal hoster name (enabled) → [`ProviderCategory::Internal`]
//! 2. Upstream `player` kind (`player` enabled) → [`ProviderCategory::Player`]
//! 3. Known hoster URL substring, else provider-name match (enabled) →
//!    [`ProviderCategory::NamedProvider`]
//! 4. Anything else → [`ProviderCategory::Unmatched`], dropped before scheduling

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::codec::decode_xor;
use crate::stream::provider::{
    ClassifiedServer, NamedHoster, ProviderCategory, SourceRecord, UserPreferences,
};

/// Hoster names served from the site's own API.
pub const INTERNAL_HOSTER_NAMES: [&str; 11] = [
    "Default", "Ac", "Ak", "Kir", "Rab", "Luf-mp4", "Si-Hls", "S-mp4", "Ac-Hls", "Uv-mp4",
    "Pn-Hls",
];

/// Enabled-provider key that admits [`ProviderCategory::Player`].
pub const PLAYER_KEY: &str = "player";

fn word_regex(word: &str) -> Regex {
    Regex::new(&format!(r"\b{}\b", regex::escape(&word.to_lowercase()))).expect("static regex")
}

static INTERNAL_NAME_RES: Lazy<Vec<(String, Regex)>> = Lazy::new(|| {
    INTERNAL_HOSTER_NAMES
        .iter()
        .map(|name| (name.to_lowercase(), word_regex(name)))
        .collect()
});

static HOSTER_NAME_RES: Lazy<Vec<(NamedHoster, Regex)>> = Lazy::new(|| {
    NamedHoster::ALL
        .iter()
        .map(|hoster| (*hoster, word_regex(hoster.key())))
        .collect()
});

/// Maps source records to provider categories.
#[derive(Debug, Clone)]
pub struct Classifier {
    api_prefix: String,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new("/apivtwo/")
    }
}

impl Classifier {
    pub fn new(api_prefix: impl Into<String>) -> Self {
        Self {
            api_prefix: api_prefix.into(),
        }
    }

    /// Decode and classify one record.
    pub fn classify(&self, record: &SourceRecord, prefs: &UserPreferences) -> ClassifiedServer {
        let decoded_url = decode_xor(&record.raw_url);
        let category = self.category_for(&decoded_url, record, prefs);

        debug!(
            provider = %record.provider_name,
            url = %decoded_url,
            %category,
            "classified source"
        );

        ClassifiedServer {
            decoded_url,
            category,
            priority: record.priority,
            provider_name: record.provider_name.clone(),
        }
    }

    /// Classify every record, dropping unmatched ones.
    pub fn classify_all(
        &self,
        records: &[SourceRecord],
        prefs: &UserPreferences,
    ) -> Vec<ClassifiedServer> {
        records
            .iter()
            .map(|record| self.classify(record, prefs))
            .filter(|server| server.category != ProviderCategory::Unmatched)
            .collect()
    }

    fn category_for(
        &self,
        decoded_url: &str,
        record: &SourceRecord,
        prefs: &UserPreferences,
    ) -> ProviderCategory {
        if decoded_url.trim().is_empty() {
            return ProviderCategory::Unmatched;
        }

        let name = record.provider_name.to_lowercase();

        if decoded_url.starts_with(&self.api_prefix)
            && INTERNAL_NAME_RES
                .iter()
                .any(|(key, re)| re.is_match(&name) && prefs.is_enabled(key))
        {
            return ProviderCategory::Internal;
        }

        if record.kind.eq_ignore_ascii_case(PLAYER_KEY) && prefs.is_enabled(PLAYER_KEY) {
            return ProviderCategory::Player;
        }

        let url = decoded_url.to_lowercase();
        let enabled = move || {
            HOSTER_NAME_RES
                .iter()
                .filter(move |(hoster, _)| prefs.is_enabled(hoster.key()))
        };
        enabled()
            .find(|(hoster, _)| hoster.url_patterns().iter().any(|p| url.contains(p)))
            .or_else(|| enabled().find(|(_, name_re)| name_re.is_match(&name)))
            .map_or(ProviderCategory::Unmatched, |(hoster, _)| {
                ProviderCategory::NamedProvider(*hoster)
            })
    }
}
