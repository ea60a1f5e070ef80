//! MegaCloud-style encrypted embeds.
//!
//! Flow: embed page → video id from the `/e-1/{id}` path → `getSources`
//! JSON → decrypt `sources` when `encrypted` → manifest parsing. Direct
//! decryption gets a fixed number of attempts before the browser fallback
//! is consulted.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{absolute_url, origin_headers, origin_of};
use crate::codec::{extract_key_fragments, try_decrypt_aes_sources, SourceFile};
use crate::http_client::HttpContext;
use crate::stream::fallback::{BrowserFallback, KeyScriptFetcher};
use crate::stream::manifest::{resolve_manifest, ManifestKind, StreamTemplate};
use crate::stream::provider::{ClassifiedServer, HosterExtractor, Stream, Track};

const EMBED_MARKER: &str = "/e-1/";

#[derive(Debug, Deserialize)]
struct GetSources {
    #[serde(default)]
    sources: Value,
    #[serde(default)]
    encrypted: bool,
    #[serde(default)]
    tracks: Vec<CaptionTrack>,
}

#[derive(Debug, Deserialize)]
struct CaptionTrack {
    file: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    kind: Option<String>,
}

/// Opaque video id: the path segment after `/e-1/`, without query.
pub fn video_id(embed_url: &str) -> Option<&str> {
    let (_, rest) = embed_url.split_once(EMBED_MARKER)?;
    let id = rest.split(['?', '#', '/']).next()?;
    (!id.is_empty()).then_some(id)
}

fn subtitle_tracks(tracks: Vec<CaptionTrack>) -> Vec<Track> {
    tracks
        .into_iter()
        .filter(|t| matches!(t.kind.as_deref(), Some("captions" | "subtitles")))
        .map(|t| Track::new(t.file, t.label.unwrap_or_else(|| "Unknown".to_string())))
        .collect()
}

/// Extractor for encrypted embed players.
pub struct MegacloudExtractor {
    key_script: Arc<dyn KeyScriptFetcher>,
    browser_fallback: Option<Arc<dyn BrowserFallback>>,
    direct_attempts: u32,
}

impl MegacloudExtractor {
    pub fn new(
        key_script: Arc<dyn KeyScriptFetcher>,
        browser_fallback: Option<Arc<dyn BrowserFallback>>,
        direct_attempts: u32,
    ) -> Self {
        Self {
            key_script,
            browser_fallback,
            direct_attempts: direct_attempts.max(1),
        }
    }

    /// Decrypt `ciphertext`, refetching the key script on each attempt.
    async fn decrypt_direct(&self, ciphertext: &str, ctx: &HttpContext) -> Option<Vec<SourceFile>> {
        for attempt in 1..=self.direct_attempts {
            let script = match self.key_script.fetch_script(ctx).await {
                Ok(script) => script,
                Err(e) => {
                    warn!(attempt, "key script fetch failed: {e:#}");
                    continue;
                }
            };

            let fragments = extract_key_fragments(&script);
            if fragments.is_empty() {
                warn!(attempt, "key pattern not found in player script");
                continue;
            }

            match try_decrypt_aes_sources(ciphertext, &fragments) {
                Ok(files) if !files.is_empty() => return Some(files),
                Ok(_) => warn!(attempt, "decrypted source list is empty"),
                Err(e) => warn!(attempt, error = %e, "source decryption failed"),
            }
        }
        None
    }

    async fn fallback(&self, id: &str) -> Vec<SourceFile> {
        let Some(fallback) = &self.browser_fallback else {
            info!(id, "direct decryption failed and no browser fallback configured");
            return Vec::new();
        };
        match fallback.resolve(id).await {
            Ok(files) => files,
            Err(e) => {
                warn!(id, "browser fallback failed: {e:#}");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl HosterExtractor for MegacloudExtractor {
    fn name(&self) -> &'static str {
        "megacloud"
    }

    async fn try_extract(&self, server: &ClassifiedServer, ctx: &HttpContext) -> Result<Vec<Stream>> {
        let embed_url = absolute_url(&server.decoded_url);
        let id = video_id(&embed_url).context("no video id in embed URL")?;
        let origin = origin_of(&embed_url).context("embed URL has no origin")?;

        let page_headers = BTreeMap::from([("Referer".to_string(), format!("{origin}/"))]);
        ctx.get_text(&embed_url, &page_headers)
            .await
            .context("failed to fetch embed page")?;

        let sources_url = format!(
            "{origin}/embed-2/ajax/e-1/getSources?id={}",
            urlencoding::encode(id)
        );
        let api_headers = BTreeMap::from([
            ("X-Requested-With".to_string(), "XMLHttpRequest".to_string()),
            ("Referer".to_string(), embed_url.clone()),
        ]);
        let response: GetSources = ctx
            .get_json(&sources_url, &api_headers)
            .await
            .context("getSources request failed")?;

        let files = match (&response.sources, response.encrypted) {
            (Value::String(ciphertext), true) => match self.decrypt_direct(ciphertext, ctx).await {
                Some(files) => files,
                None => self.fallback(id).await,
            },
            (Value::Array(_), _) => serde_json::from_value(response.sources.clone())
                .context("unexpected getSources payload")?,
            _ => {
                debug!(id, "getSources returned no usable sources");
                self.fallback(id).await
            }
        };

        let subtitles = subtitle_tracks(response.tracks);
        let mut streams = Vec::new();
        for file in files {
            let url = absolute_url(&file.url);
            let template = StreamTemplate::new(self.name())
                .with_headers(origin_headers(&origin, &url))
                .with_subtitles(subtitles.clone());
            let kind = ManifestKind::detect(&url).unwrap_or(ManifestKind::Hls);
            let parsed = resolve_manifest(ctx, kind, &url, |q| format!("MegaCloud - {q}"), &template).await;
            streams.extend(parsed);
        }

        Ok(streams)
    }
}
