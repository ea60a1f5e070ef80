//! Preference-driven stream ordering.
//!
//! Streams are sorted descending by `(server, quality, resolution, language)`
//! scores. The sort is stable, so equal keys keep aggregation order.

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::stream::provider::{Stream, UserPreferences};

static RESOLUTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)p").expect("static regex"));

/// A stream paired with the priority of the server it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub stream: Stream,
    pub server_priority: f64,
}

impl Candidate {
    pub fn new(stream: Stream, server_priority: f64) -> Self {
        Self {
            stream,
            server_priority,
        }
    }
}

/// Ordinal for the first `NNNp` in a label; unknown heights score 0.
pub fn resolution_tier(label: &str) -> i32 {
    let label = label.to_lowercase();
    let Some(caps) = RESOLUTION_RE.captures(&label) else {
        return 0;
    };
    match &caps[1] {
        "2160" => 5,
        "1440" => 4,
        "1080" => 3,
        "720" => 2,
        "480" => 1,
        "240" => -1,
        "144" => -2,
        _ => 0,
    }
}

fn contains_token(label: &str, token: &str) -> bool {
    !token.is_empty() && label.contains(&token.to_lowercase())
}

/// Sort key for one candidate. Compared lexicographically, higher first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub server: f64,
    pub quality: i32,
    pub resolution: i32,
    pub language: i32,
}

impl Score {
    fn cmp_desc(&self, other: &Self) -> Ordering {
        other
            .server
            .total_cmp(&self.server)
            .then_with(|| other.quality.cmp(&self.quality))
            .then_with(|| other.resolution.cmp(&self.resolution))
            .then_with(|| other.language.cmp(&self.language))
    }
}

/// Score one candidate against the user's preferences.
///
/// With no preferred provider, the server score is the upstream priority
/// itself so higher-priority servers sort first.
pub fn score(candidate: &Candidate, prefs: &UserPreferences) -> Score {
    let label = candidate.stream.quality_label.to_lowercase();

    let server = if prefs.uses_default_provider() {
        candidate.server_priority
    } else if contains_token(&label, &prefs.preferred_provider_name) {
        1.0
    } else {
        0.0
    };

    Score {
        server,
        quality: i32::from(contains_token(&label, &prefs.preferred_quality_token)),
        resolution: resolution_tier(&label),
        language: i32::from(contains_token(&label, &prefs.preferred_language_token)),
    }
}

/// Order candidates by preference and strip the ranking metadata.
pub fn rank(candidates: Vec<Candidate>, prefs: &UserPreferences) -> Vec<Stream> {
    let mut scored: Vec<(Score, Candidate)> = candidates
        .into_iter()
        .map(|c| (score(&c, prefs), c))
        .collect();
    scored.sort_by(|(a, _), (b, _)| a.cmp_desc(b));
    scored.into_iter().map(|(_, c)| c.stream).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(label: &str, priority: f64) -> Candidate {
        Candidate::new(Stream::new(format!("https://cdn/{label}"), label, "t"), priority)
    }

    fn prefs(provider: &str, quality: &str, language: &str) -> UserPreferences {
        UserPreferences {
            preferred_provider_name: provider.to_string(),
            preferred_quality_token: quality.to_string(),
            preferred_language_token: language.to_string(),
            ..UserPreferences::default()
        }
    }

    fn labels(streams: &[Stream]) -> Vec<&str> {
        streams.iter().map(|s| s.quality_label.as_str()).collect()
    }

    #[test]
    fn resolution_tiers() {
        assert_eq!(resolution_tier("2160p HDR"), 5);
        assert_eq!(resolution_tier("1080p 4 mb/s (Default - Hls)"), 3);
        assert_eq!(resolution_tier("Okru - 144p"), -2);
        assert_eq!(resolution_tier("360p"), 0);
        assert_eq!(resolution_tier("Original (Ac - Mp4)"), 0);
        assert_eq!(resolution_tier("999p"), 0);
    }

    #[test]
    fn higher_priority_first_with_default_provider() {
        let ranked = rank(
            vec![candidate("Original (a)", 1.0), candidate("Original (b)", 5.0)],
            &prefs("default", "", ""),
        );
        assert_eq!(labels(&ranked), vec!["Original (b)", "Original (a)"]);
    }

    #[test]
    fn site_default_behaves_like_default() {
        let ranked = rank(
            vec![candidate("x", 1.0), candidate("y", 2.0)],
            &prefs("site_default", "", ""),
        );
        assert_eq!(labels(&ranked), vec!["y", "x"]);
    }

    #[test]
    fn preferred_provider_dominates_priority() {
        let ranked = rank(
            vec![
                candidate("1080p (Default - Hls)", 9.0),
                candidate("480p (Ak - Mp4)", 1.0),
            ],
            &prefs("Ak", "1080", "sub"),
        );
        assert_eq!(labels(&ranked), vec!["480p (Ak - Mp4)", "1080p (Default - Hls)"]);
    }

    #[test]
    fn quality_then_resolution_then_language() {
        let ranked = rank(
            vec![
                candidate("480p sub", 1.0),
                candidate("1080p dub", 1.0),
                candidate("720p dub", 1.0),
                candidate("720p sub", 1.0),
            ],
            &prefs("default", "720", "sub"),
        );
        assert_eq!(
            labels(&ranked),
            vec!["720p sub", "720p dub", "1080p dub", "480p sub"]
        );
    }

    #[test]
    fn ties_keep_input_order() {
        let ranked = rank(
            vec![candidate("first", 1.0), candidate("second", 1.0), candidate("third", 1.0)],
            &prefs("default", "1080", "sub"),
        );
        assert_eq!(labels(&ranked), vec!["first", "second", "third"]);
    }

    #[test]
    fn ranking_is_deterministic() {
        let input: Vec<_> = (0..20)
            .map(|i| candidate(&format!("{}p v{i}", [360, 720, 1080][i % 3]), f64::from(i as u8 % 4)))
            .collect();
        let p = prefs("default", "720", "sub");
        let first = rank(input.clone(), &p);
        for _ in 0..5 {
            assert_eq!(rank(input.clone(), &p), first);
        }
    }

    #[test]
    fn tokens_match_case_insensitively() {
        let ranked = rank(
            vec![candidate("Original (KIR)", 1.0), candidate("Original (Ac)", 1.0)],
            &prefs("kir", "", ""),
        );
        assert_eq!(ranked[0].quality_label, "Original (KIR)");
    }
}
