//! Hosters that are recognized but not extracted.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::http_client::HttpContext;
use crate::stream::provider::{ClassifiedServer, HosterExtractor, NamedHoster, Stream};

/// Logs and yields no streams.
#[derive(Debug, Clone, Copy)]
pub struct UnsupportedExtractor {
    hoster: NamedHoster,
}

impl UnsupportedExtractor {
    pub fn new(hoster: NamedHoster) -> Self {
        Self { hoster }
    }
}

#[async_trait]
impl HosterExtractor for UnsupportedExtractor {
    fn name(&self) -> &'static str {
        self.hoster.key()
    }

    async fn try_extract(&self, server: &ClassifiedServer, _ctx: &HttpContext) -> Result<Vec<Stream>> {
        info!(hoster = %self.hoster, url = %server.decoded_url, "no extractor for hoster, skipping");
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::stream::provider::ProviderCategory;

    #[tokio::test]
    async fn yields_nothing() {
        let ctx = HttpContext::new(&HttpConfig::default()).unwrap();
        let server = ClassifiedServer {
            decoded_url: "https://dood.example/e/1".to_string(),
            category: ProviderCategory::NamedProvider(NamedHoster::Doodstream),
            priority: 1.0,
            provider_name: "Doodstream".to_string(),
        };
        let extractor = UnsupportedExtractor::new(NamedHoster::Doodstream);
        assert_eq!(extractor.name(), "doodstream");
        assert!(extractor.extract(&server, &ctx).await.is_empty());
    }
}
