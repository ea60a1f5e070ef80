//! Upstream `player` entries: already direct links.

use anyhow::Result;
use async_trait::async_trait;

use super::{absolute_url, direct_manifest};
use crate::http_client::HttpContext;
use crate::stream::provider::{ClassifiedServer, HosterExtractor, Stream};

/// Pass-through extractor for direct player links.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerExtractor;

#[async_trait]
impl HosterExtractor for PlayerExtractor {
    fn name(&self) -> &'static str {
        "player"
    }

    async fn try_extract(&self, server: &ClassifiedServer, ctx: &HttpContext) -> Result<Vec<Stream>> {
        let url = absolute_url(&server.decoded_url);
        let name = server.provider_name.clone();

        if let Some(streams) = direct_manifest(ctx, &url, self.name(), |q| {
            format!("{q} (player {name})")
        })
        .await
        {
            return Ok(streams);
        }

        Ok(vec![Stream::new(
            url,
            format!("Original (player {})", server.provider_name),
            self.name(),
        )])
    }
}
