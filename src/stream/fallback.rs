//! Collaborators the encrypted-embed extractor depends on.
//!
//! The AES key lives in a third-party player script that changes without
//! notice, so both the script source and the last-resort browser path sit
//! behind traits that callers can replace.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::instrument;

use crate::codec::SourceFile;
use crate::http_client::HttpContext;

/// Supplies the provider's current minified player script.
#[async_trait]
pub trait KeyScriptFetcher: Send + Sync {
    async fn fetch_script(&self, ctx: &HttpContext) -> Result<String>;
}

/// Downloads the player script over HTTP.
#[derive(Debug, Clone)]
pub struct HttpKeyScriptFetcher {
    url: String,
}

impl HttpKeyScriptFetcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl KeyScriptFetcher for HttpKeyScriptFetcher {
    #[instrument(skip(self, ctx), fields(url = %self.url))]
    async fn fetch_script(&self, ctx: &HttpContext) -> Result<String> {
        ctx.get_text(&self.url, &BTreeMap::new()).await
    }
}

/// Script text fixed at construction time.
#[derive(Debug, Clone)]
pub struct StaticKeyScript(pub String);

#[async_trait]
impl KeyScriptFetcher for StaticKeyScript {
    async fn fetch_script(&self, _ctx: &HttpContext) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Browser-automation path used after direct decryption has failed.
///
/// Implementations load the embed in a real browser and return the same
/// `{url, label}` list the decrypted `getSources` payload would have held.
#[async_trait]
pub trait BrowserFallback: Send + Sync {
    async fn resolve(&self, video_id: &str) -> Result<Vec<SourceFile>>;
}
