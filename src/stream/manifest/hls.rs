//! HLS master playlist parsing.

use std::collections::HashMap;

use tracing::{debug, instrument, warn};

use super::{base_of, resolve_url, StreamTemplate};
use crate::http_client::HttpContext;
use crate::stream::provider::{Stream, Track};

const STREAM_INF: &str = "#EXT-X-STREAM-INF:";
const MEDIA: &str = "#EXT-X-MEDIA:";

/// Format a bandwidth attribute as a decimal throughput string.
///
/// Uses 1000-multiples and truncating division: `1_500_000` → `"1 mb/s"`.
pub fn format_throughput(bytes: u64) -> String {
    const KILO: u64 = 1000;
    const MEGA: u64 = KILO * 1000;
    const GIGA: u64 = MEGA * 1000;
    const TERA: u64 = GIGA * 1000;

    match bytes {
        b if b < KILO => format!("{b} b/s"),
        b if b < MEGA => format!("{} kb/s", b / KILO),
        b if b < GIGA => format!("{} mb/s", b / MEGA),
        b if b < TERA => format!("{} gb/s", b / GIGA),
        b => format!("{} tb/s", b / TERA),
    }
}

/// Parse an HLS playlist into streams.
///
/// A playlist without `#EXT-X-STREAM-INF:` is a leaf playlist and yields one
/// stream pointing at `playlist_url`, labelled `name_gen("original")`.
/// Otherwise every variant becomes one stream labelled
/// `name_gen("{height}p[ {throughput}]")`. `TYPE=AUDIO` and
/// `TYPE=SUBTITLES` renditions are attached to every stream after the
/// template's own tracks.
pub fn parse_hls_master<F>(
    text: &str,
    playlist_url: &str,
    name_gen: F,
    template: &StreamTemplate,
) -> Vec<Stream>
where
    F: Fn(&str) -> String,
{
    if !text.contains(STREAM_INF) {
        return vec![template.stamp(playlist_url, name_gen("original"))];
    }

    let base = base_of(playlist_url);
    let (subtitles, audio_tracks) = parse_renditions(text, base);

    let mut tracks = template.clone();
    tracks.subtitles.extend(subtitles);
    tracks.audio_tracks.extend(audio_tracks);

    text.split(STREAM_INF)
        .skip(1)
        .filter_map(|segment| {
            let mut lines = segment.lines();
            let attrs = parse_attributes(lines.next().unwrap_or_default());
            let Some(uri) = lines
                .map(str::trim)
                .find(|line| !line.is_empty() && !line.starts_with('#'))
            else {
                debug!("variant without URI skipped");
                return None;
            };

            let quality = variant_quality(&attrs);
            Some(tracks.stamp_rendition(resolve_url(base, uri), name_gen(&quality)))
        })
        .collect()
}

fn variant_quality(attrs: &HashMap<String, String>) -> String {
    let resolution = attrs
        .get("RESOLUTION")
        .and_then(|r| r.split_once('x'))
        .map_or_else(|| "Unknown".to_string(), |(_, h)| format!("{h}p"));

    let bandwidth = attrs
        .get("AVERAGE-BANDWIDTH")
        .or_else(|| attrs.get("BANDWIDTH"))
        .and_then(|b| b.parse::<u64>().ok());

    match bandwidth {
        Some(b) => format!("{resolution} {}", format_throughput(b)),
        None => resolution,
    }
}

/// Collect `(subtitles, audio)` renditions declared by `#EXT-X-MEDIA` tags.
fn parse_renditions(text: &str, base: &str) -> (Vec<Track>, Vec<Track>) {
    let mut subtitles = Vec::new();
    let mut audio = Vec::new();

    for line in text.lines() {
        let Some(attr_str) = line.trim().strip_prefix(MEDIA) else {
            continue;
        };
        let attrs = parse_attributes(attr_str);
        let Some(uri) = attrs.get("URI").filter(|u| !u.is_empty()) else {
            continue;
        };
        let label = attrs
            .get("NAME")
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string());
        let track = Track::new(resolve_url(base, uri), label);

        match attrs.get("TYPE").map(String::as_str) {
            Some("AUDIO") => audio.push(track),
            Some("SUBTITLES") => subtitles.push(track),
            _ => {}
        }
    }

    (subtitles, audio)
}

/// Parse `KEY=value,KEY="quoted,value"` attribute lists.
pub(crate) fn parse_attributes(attr_str: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    let mut chars = attr_str.chars().peekable();

    while chars.peek().is_some() {
        let key: String = chars.by_ref().take_while(|&c| c != '=').collect();

        if key.is_empty() {
            break;
        }

        let value = if chars.peek() == Some(&'"') {
            chars.next(); // opening quote
            let v: String = chars.by_ref().take_while(|&c| c != '"').collect();
            chars.next(); // trailing comma
            v
        } else {
            chars.by_ref().take_while(|&c| c != ',').collect()
        };

        attrs.insert(key.trim().to_string(), value.trim().to_string());
    }

    attrs
}

/// Quality guessed from the URL when the playlist cannot be fetched.
fn guess_quality(url: &str) -> &'static str {
    if url.contains("720") {
        "720p"
    } else if url.contains("1080") {
        "1080p"
    } else {
        "Unknown"
    }
}

/// Fetch `playlist_url` and parse it.
///
/// Never fails: a fetch error yields one fallback stream whose quality is
/// guessed from the URL.
#[instrument(skip(ctx, name_gen, template), fields(url = %playlist_url))]
pub async fn resolve_hls<F>(
    ctx: &HttpContext,
    playlist_url: &str,
    name_gen: F,
    template: &StreamTemplate,
) -> Vec<Stream>
where
    F: Fn(&str) -> String + Send + Sync,
{
    match ctx.get_text(playlist_url, &template.headers).await {
        Ok(text) => {
            let streams = parse_hls_master(&text, playlist_url, &name_gen, template);
            debug!(variants = streams.len(), "parsed HLS playlist");
            streams
        }
        Err(e) => {
            warn!("HLS fetch failed, using fallback stream: {e:#}");
            vec![template.stamp(playlist_url, name_gen(guess_quality(playlist_url)))]
        }
    }
}
