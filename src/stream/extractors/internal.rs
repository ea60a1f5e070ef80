//! The site's own API servers (`/apivtwo/clock?...`).
//!
//! `{site}/getVersion` names the iframe head host; the clock JSON served
//! from there lists `links[]`, each flagged with the kind of media it
//! carries.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{absolute_url, origin_headers};
use crate::http_client::HttpContext;
use crate::stream::manifest::{format_throughput, resolve_dash, resolve_hls, StreamTemplate};
use crate::stream::provider::{ClassifiedServer, HosterExtractor, Stream, Track};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Version {
    episode_iframe_head: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClockResponse {
    links: Vec<ClockLink>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ClockLink {
    link: String,
    resolution_str: String,
    mp4: Option<bool>,
    hls: Option<bool>,
    cr_iframe: Option<bool>,
    dash: Option<bool>,
    subtitles: Vec<ClockSubtitle>,
    port_data: Option<PortData>,
    raw_urls: Option<RawUrls>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClockSubtitle {
    src: String,
    lang: Option<String>,
    label: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PortData {
    streams: Vec<PortStream>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PortStream {
    format: String,
    url: String,
    hardsub_lang: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawUrls {
    vids: Vec<RawVideo>,
    audios: Vec<RawAudio>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawVideo {
    url: String,
    height: Option<u32>,
    bandwidth: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAudio {
    url: String,
    bandwidth: u64,
}

impl ClockLink {
    fn subtitle_tracks(&self) -> Vec<Track> {
        self.subtitles
            .iter()
            .map(|sub| {
                let lang = sub.lang.as_deref().unwrap_or("unknown");
                let label = match sub.label.as_deref().filter(|l| !l.is_empty()) {
                    Some(l) => format!("{lang} - {l}"),
                    None => lang.to_string(),
                };
                Track::new(sub.src.clone(), label)
            })
            .collect()
    }
}

fn hardsub_suffix(stream: &PortStream) -> String {
    stream
        .hardsub_lang
        .as_deref()
        .filter(|lang| !lang.is_empty())
        .map(|lang| format!(" - Hardsub: {lang}"))
        .unwrap_or_default()
}

/// `/clock?` endpoints answer with HTML; the JSON twin is `/clock.json?`.
pub fn clock_json_path(url: &str) -> String {
    url.replace("/clock?", "/clock.json?")
}

/// Extractor for first-party API servers.
#[derive(Debug, Clone)]
pub struct InternalExtractor {
    site_url: String,
}

impl InternalExtractor {
    pub fn new(site_url: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn iframe_head(&self, ctx: &HttpContext) -> Result<Option<String>> {
        let headers = BTreeMap::from([("Referer".to_string(), format!("{}/", self.site_url))]);
        let version: Version = ctx
            .get_json(&format!("{}/getVersion", self.site_url), &headers)
            .await
            .context("getVersion request failed")?;
        Ok(version
            .episode_iframe_head
            .map(|head| head.trim_end_matches('/').to_string())
            .filter(|head| !head.is_empty()))
    }

    async fn link_streams(
        &self,
        ctx: &HttpContext,
        head: &str,
        name: &str,
        link: &ClockLink,
    ) -> Vec<Stream> {
        let subtitles = link.subtitle_tracks();
        let url = absolute_url(&link.link);
        let res = link.resolution_str.as_str();

        if link.mp4 == Some(true) {
            let stream = Stream::new(url.clone(), format!("Original ({name} - {res})"), self.name())
                .with_headers(origin_headers(head, &url))
                .with_subtitles(subtitles);
            return vec![stream];
        }

        if link.hls == Some(true) {
            let mut headers = origin_headers(head, &url);
            headers.insert("Accept".to_string(), "*/*".to_string());
            let template = StreamTemplate::new(self.name())
                .with_headers(headers)
                .with_subtitles(subtitles);
            return resolve_hls(ctx, &url, |q| format!("{q} ({name} - {res})"), &template).await;
        }

        if link.cr_iframe == Some(true) {
            let Some(port) = &link.port_data else {
                return Vec::new();
            };
            let mut streams = Vec::new();
            for port_stream in &port.streams {
                let hardsub = hardsub_suffix(port_stream);
                let stream_url = absolute_url(&port_stream.url);
                let template = StreamTemplate::new(self.name()).with_subtitles(subtitles.clone());
                match port_stream.format.as_str() {
                    "adaptive_dash" => {
                        let label = format!("Original (AC - Dash{hardsub})");
                        streams.extend(resolve_dash(ctx, &stream_url, |_| label.clone(), &template).await);
                    }
                    "adaptive_hls" => {
                        streams.extend(
                            resolve_hls(ctx, &stream_url, |q| format!("{q} (AC - HLS{hardsub})"), &template)
                                .await,
                        );
                    }
                    other => debug!(format = other, "skipping port stream format"),
                }
            }
            return streams;
        }

        if link.dash == Some(true) {
            let Some(raw) = &link.raw_urls else {
                return Vec::new();
            };
            let audio_tracks: Vec<Track> = raw
                .audios
                .iter()
                .map(|audio| Track::new(absolute_url(&audio.url), format_throughput(audio.bandwidth)))
                .collect();
            return raw
                .vids
                .iter()
                .map(|vid| {
                    let height = vid.height.map_or_else(|| "Unknown".to_string(), |h| h.to_string());
                    let label = format!("{name} - {height} {}", format_throughput(vid.bandwidth));
                    let vid_url = absolute_url(&vid.url);
                    Stream::new(vid_url.clone(), label, self.name())
                        .with_headers(origin_headers(head, &vid_url))
                        .with_subtitles(subtitles.clone())
                        .with_audio_tracks(audio_tracks.clone())
                })
                .collect();
        }

        debug!(link = %link.link, "clock link carries no known media kind");
        Vec::new()
    }
}

#[async_trait]
impl HosterExtractor for InternalExtractor {
    fn name(&self) -> &'static str {
        "internal"
    }

    async fn try_extract(&self, server: &ClassifiedServer, ctx: &HttpContext) -> Result<Vec<Stream>> {
        let Some(head) = self.iframe_head(ctx).await? else {
            warn!(site = %self.site_url, "getVersion returned no episodeIframeHead");
            return Ok(Vec::new());
        };

        let clock_url = format!("{head}{}", clock_json_path(&server.decoded_url));
        let clock: ClockResponse = ctx
            .get_json(&clock_url, &origin_headers(&head, &clock_url))
            .await
            .context("clock request failed")?;

        let mut streams = Vec::new();
        for link in &clock.links {
            streams.extend(self.link_streams(ctx, &head, &server.provider_name, link).await);
        }
        debug!(server = %server.provider_name, links = clock.links.len(), streams = streams.len(), "internal links resolved");
        Ok(streams)
    }
}
