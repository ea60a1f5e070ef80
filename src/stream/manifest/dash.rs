//! DASH MPD parsing.
//!
//! The MPD itself is handed to the player, so parsing only enriches the
//! single adaptive stream: the tallest video representation becomes part of
//! the label and audio adaptation sets become audio tracks.

use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, instrument, warn};

use super::{base_of, resolve_url, StreamTemplate};
use crate::http_client::HttpContext;
use crate::stream::provider::{Stream, Track};

/// Label used when no video height is known.
pub const ADAPTIVE: &str = "adaptive";

#[derive(Debug, Default)]
struct AdaptationSet {
    is_audio: bool,
    is_video: bool,
    label: Option<String>,
    base_url: Option<String>,
}

/// Summary of an MPD document.
#[derive(Debug, Default, PartialEq)]
pub struct MpdSummary {
    pub max_height: Option<u32>,
    pub audio_tracks: Vec<Track>,
}

/// Read an attribute as UTF-8 text.
fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

fn classify_mime(set: &mut AdaptationSet, element: &BytesStart<'_>) {
    let kind = attribute(element, b"contentType")
        .or_else(|| attribute(element, b"mimeType"))
        .unwrap_or_default();
    if kind.starts_with("audio") {
        set.is_audio = true;
    } else if kind.starts_with("video") {
        set.is_video = true;
    }
}

/// Walk an MPD and summarize its video heights and audio sets.
pub fn summarize_mpd(xml: &str, mpd_url: &str) -> Result<MpdSummary> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let base = base_of(mpd_url);
    let mut summary = MpdSummary::default();
    let mut current: Option<AdaptationSet> = None;
    let mut in_base_url = false;
    let mut saw_mpd = false;

    loop {
        let event = reader.read_event().context("malformed MPD")?;
        // Self-closing AdaptationSets carry no representations
        let self_closing = matches!(event, Event::Empty(_));
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                match e.local_name().as_ref() {
                    b"MPD" => saw_mpd = true,
                    b"AdaptationSet" if !self_closing => {
                        let mut set = AdaptationSet {
                            label: attribute(e, b"label").or_else(|| attribute(e, b"lang")),
                            ..AdaptationSet::default()
                        };
                        classify_mime(&mut set, e);
                        current = Some(set);
                    }
                    b"Representation" => {
                        if let Some(set) = current.as_mut() {
                            classify_mime(set, e);
                            let height = attribute(e, b"height").and_then(|h| h.parse::<u32>().ok());
                            if let Some(h) = height {
                                set.is_video = set.is_video || !set.is_audio;
                                if set.is_video {
                                    summary.max_height = summary.max_height.max(Some(h));
                                }
                            }
                        }
                    }
                    b"BaseURL" => in_base_url = true,
                    _ => {}
                }
            }
            Event::Text(ref t) => {
                if in_base_url {
                    if let Some(set) = current.as_mut().filter(|s| s.base_url.is_none()) {
                        let text = t.unescape().context("bad BaseURL text")?;
                        set.base_url = Some(resolve_url(base, text.trim()));
                    }
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"BaseURL" => in_base_url = false,
                b"AdaptationSet" => {
                    if let Some(set) = current.take().filter(|s| s.is_audio) {
                        let index = summary.audio_tracks.len() + 1;
                        summary.audio_tracks.push(Track::new(
                            set.base_url.unwrap_or_else(|| mpd_url.to_string()),
                            set.label.unwrap_or_else(|| format!("Audio {index}")),
                        ));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    anyhow::ensure!(saw_mpd, "document has no MPD root");
    Ok(summary)
}

/// Parse an MPD into a single adaptive stream pointing at `mpd_url`.
///
/// Parse failures degrade to a plain `name_gen("adaptive")` stream.
pub fn parse_dash_manifest<F>(
    xml: &str,
    mpd_url: &str,
    name_gen: F,
    template: &StreamTemplate,
) -> Vec<Stream>
where
    F: Fn(&str) -> String,
{
    match summarize_mpd(xml, mpd_url) {
        Ok(summary) => {
            let quality = summary
                .max_height
                .map_or_else(|| ADAPTIVE.to_string(), |h| format!("{h}p {ADAPTIVE}"));
            let mut stream = template.stamp(mpd_url, name_gen(&quality));
            stream.audio_tracks.extend(summary.audio_tracks);
            vec![stream]
        }
        Err(e) => {
            debug!("MPD not parsed, using adaptive stream: {e:#}");
            vec![template.stamp(mpd_url, name_gen(ADAPTIVE))]
        }
    }
}

/// Fetch and parse an MPD. Never fails.
#[instrument(skip(ctx, name_gen, template), fields(url = %mpd_url))]
pub async fn resolve_dash<F>(
    ctx: &HttpContext,
    mpd_url: &str,
    name_gen: F,
    template: &StreamTemplate,
) -> Vec<Stream>
where
    F: Fn(&str) -> String + Send + Sync,
{
    match ctx.get_text(mpd_url, &template.headers).await {
        Ok(xml) => parse_dash_manifest(&xml, mpd_url, &name_gen, template),
        Err(e) => {
            warn!("MPD fetch failed, using adaptive stream: {e:#}");
            vec![template.stamp(mpd_url, name_gen(ADAPTIVE))]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MPD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="static">
  <Period>
    <AdaptationSet contentType="video" mimeType="video/mp4">
      <Representation id="v1" bandwidth="800000" width="854" height="480"/>
      <Representation id="v2" bandwidth="3000000" width="1920" height="1080"/>
    </AdaptationSet>
    <AdaptationSet mimeType="audio/mp4" lang="ja">
      <Representation id="a1" bandwidth="128000">
        <BaseURL>audio/ja.mp4</BaseURL>
      </Representation>
    </AdaptationSet>
    <AdaptationSet mimeType="audio/mp4" label="Commentary">
      <Representation id="a2" bandwidth="96000"/>
    </AdaptationSet>
  </Period>
</MPD>"#;

    fn same(q: &str) -> String {
        q.to_string()
    }

    #[test]
    fn summarizes_heights_and_audio() {
        let url = "https://cdn.example.com/ep/manifest.mpd";
        let summary = summarize_mpd(MPD, url).unwrap();
        assert_eq!(summary.max_height, Some(1080));
        assert_eq!(summary.audio_tracks.len(), 2);
        assert_eq!(summary.audio_tracks[0].label, "ja");
        assert_eq!(
            summary.audio_tracks[0].url,
            "https://cdn.example.com/ep/audio/ja.mp4"
        );
        assert_eq!(summary.audio_tracks[1].label, "Commentary");
        assert_eq!(summary.audio_tracks[1].url, url);
    }

    #[test]
    fn labels_with_tallest_height() {
        let streams = parse_dash_manifest(
            MPD,
            "https://cdn/m.mpd",
            |q| format!("{q} (Test)"),
            &StreamTemplate::new("t"),
        );
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].url, "https://cdn/m.mpd");
        assert_eq!(streams[0].quality_label, "1080p adaptive (Test)");
        assert_eq!(streams[0].audio_tracks.len(), 2);
    }

    #[test]
    fn garbage_degrades_to_adaptive() {
        let streams = parse_dash_manifest(
            "not xml at all",
            "https://cdn/m.mpd",
            same,
            &StreamTemplate::new("t"),
        );
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].quality_label, ADAPTIVE);
    }

    #[test]
    fn mpd_without_heights_is_adaptive() {
        let xml = r#"<MPD><Period><AdaptationSet mimeType="video/mp4"><Representation id="1"/></AdaptationSet></Period></MPD>"#;
        let streams = parse_dash_manifest(xml, "https://cdn/m.mpd", same, &StreamTemplate::new("t"));
        assert_eq!(streams[0].quality_label, ADAPTIVE);
        assert!(streams[0].audio_tracks.is_empty());
    }
}
