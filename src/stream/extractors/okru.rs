//! ok.ru embed pages.
//!
//! The embed page carries a `data-options` attribute holding JSON whose
//! `flashvars.metadata` (itself JSON, usually string-encoded) lists an HLS
//! manifest and/or progressive MP4 renditions named by size class.

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use super::{absolute_url, direct_manifest, origin_headers, origin_of};
use crate::http_client::HttpContext;
use crate::stream::manifest::{resolve_hls, StreamTemplate};
use crate::stream::provider::{ClassifiedServer, HosterExtractor, Stream};

#[derive(Debug, Deserialize)]
struct DataOptions {
    flashvars: Flashvars,
}

#[derive(Debug, Deserialize)]
struct Flashvars {
    metadata: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Metadata {
    hls_manifest_url: Option<String>,
    videos: Vec<OkVideo>,
}

#[derive(Debug, Deserialize)]
struct OkVideo {
    name: String,
    url: String,
}

/// Height for an ok.ru rendition size class.
pub fn quality_for(name: &str) -> Option<&'static str> {
    match name.to_ascii_lowercase().as_str() {
        "mobile" => Some("144p"),
        "lowest" => Some("240p"),
        "low" => Some("360p"),
        "sd" => Some("480p"),
        "hd" => Some("720p"),
        "full" => Some("1080p"),
        "quad" => Some("1440p"),
        "ultra" => Some("2160p"),
        _ => None,
    }
}

fn label(quality: &str) -> String {
    format!("Okru - {quality}")
}

/// The `data-options` attribute of the embed page, entity-decoded.
fn data_options(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("[data-options]").ok()?;
    document
        .select(&selector)
        .find_map(|el| el.value().attr("data-options").map(str::to_string))
}

fn parse_metadata(options: &str) -> Result<Metadata> {
    let options: DataOptions =
        serde_json::from_str(options).context("data-options is not JSON")?;
    let metadata = match options.flashvars.metadata {
        Value::String(s) => serde_json::from_str(&s).context("metadata is not JSON")?,
        other => serde_json::from_value(other).context("unexpected metadata shape")?,
    };
    Ok(metadata)
}

/// Extractor for ok.ru embeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct OkruExtractor;

#[async_trait]
impl HosterExtractor for OkruExtractor {
    fn name(&self) -> &'static str {
        "okru"
    }

    async fn try_extract(&self, server: &ClassifiedServer, ctx: &HttpContext) -> Result<Vec<Stream>> {
        let embed_url = absolute_url(&server.decoded_url);

        if let Some(streams) = direct_manifest(ctx, &embed_url, self.name(), label).await {
            return Ok(streams);
        }

        let html = ctx
            .get_text(&embed_url, &BTreeMap::new())
            .await
            .context("failed to fetch ok.ru embed page")?;
        let options = data_options(&html).context("embed page has no data-options")?;
        let metadata = parse_metadata(&options)?;
        let origin = origin_of(&embed_url).unwrap_or_else(|| "https://ok.ru".to_string());

        if let Some(hls_url) = metadata.hls_manifest_url.filter(|u| !u.is_empty()) {
            let hls_url = absolute_url(&hls_url);
            let template = StreamTemplate::new(self.name())
                .with_headers(origin_headers(&origin, &hls_url));
            return Ok(resolve_hls(ctx, &hls_url, label, &template).await);
        }

        let streams: Vec<Stream> = metadata
            .videos
            .into_iter()
            .filter_map(|video| {
                let Some(quality) = quality_for(&video.name) else {
                    debug!(name = %video.name, "unknown ok.ru rendition");
                    return None;
                };
                let url = absolute_url(&video.url);
                let headers = origin_headers(&origin, &url);
                Some(Stream::new(url, label(quality), self.name()).with_headers(headers))
            })
            .collect();

        Ok(streams)
    }
}
