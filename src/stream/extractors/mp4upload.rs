//! mp4upload.com embed pages.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::absolute_url;
use crate::http_client::HttpContext;
use crate::stream::provider::{ClassifiedServer, HosterExtractor, Stream};

/// Referer the mp4upload CDN checks.
pub const REFERER: &str = "https://www.mp4upload.com/";

static SRC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"src:\s*"([^"]+?\.mp4[^"]*)""#).expect("static regex"));

static HEIGHT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bHEIGHT=(\d+)").expect("static regex"));

fn referer_headers() -> BTreeMap<String, String> {
    BTreeMap::from([("Referer".to_string(), REFERER.to_string())])
}

/// Pull the video source and height out of the player setup script.
fn scrape(page: &str) -> Option<(String, Option<u32>)> {
    let src = SRC_RE.captures(page)?[1].to_string();
    let height = HEIGHT_RE
        .captures(page)
        .and_then(|caps| caps[1].parse().ok());
    Some((src, height))
}

/// Extractor for mp4upload embeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mp4uploadExtractor;

#[async_trait]
impl HosterExtractor for Mp4uploadExtractor {
    fn name(&self) -> &'static str {
        "mp4upload"
    }

    async fn try_extract(&self, server: &ClassifiedServer, ctx: &HttpContext) -> Result<Vec<Stream>> {
        let embed_url = absolute_url(&server.decoded_url);
        let headers = referer_headers();

        let page = ctx
            .get_text(&embed_url, &headers)
            .await
            .context("failed to fetch mp4upload embed page")?;
        let (src, height) = scrape(&page).context("no mp4 source in embed page")?;

        let label = match height {
            Some(h) => format!("Mp4upload - {h}p"),
            None => "Mp4upload".to_string(),
        };

        Ok(vec![
            Stream::new(absolute_url(&src), label, self.name()).with_headers(headers)
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::stream::provider::{NamedHoster, ProviderCategory};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<script>player.src({type: "video/mp4", src: "https://a4.mp4upload.com:183/d/xyz/video.mp4"});
var WIDTH=1920, HEIGHT=1080;</script>"#;

    #[test]
    fn scrapes_source_and_height() {
        let (src, height) = scrape(PAGE).unwrap();
        assert_eq!(src, "https://a4.mp4upload.com:183/d/xyz/video.mp4");
        assert_eq!(height, Some(1080));
        assert!(scrape("<html></html>").is_none());
    }

    #[tokio::test]
    async fn extracts_single_stream_with_referer() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/embed-abc.html"))
            .and(header("referer", REFERER))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&mock)
            .await;

        let ctx = HttpContext::new(&HttpConfig::default()).unwrap();
        let server = ClassifiedServer {
            decoded_url: format!("{}/embed-abc.html", mock.uri()),
            category: ProviderCategory::NamedProvider(NamedHoster::Mp4upload),
            priority: 1.0,
            provider_name: "Mp4".to_string(),
        };
        let streams = Mp4uploadExtractor.extract(&server, &ctx).await;
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].quality_label, "Mp4upload - 1080p");
        assert_eq!(streams[0].required_headers["Referer"], REFERER);
    }
}
