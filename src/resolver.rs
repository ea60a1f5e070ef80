//! Pipeline facade: `ResolveRequest` in, ranked `ResolveResponse` out.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ReelConfig;
use crate::error::ResolveError;
use crate::http_client::HttpContext;
use crate::stream::classify::Classifier;
use crate::stream::extractors::{Extractors, MegacloudExtractor};
use crate::stream::fallback::{BrowserFallback, HttpKeyScriptFetcher, KeyScriptFetcher};
use crate::stream::provider::{
    ClassifiedServer, HosterExtractor, NamedHoster, ProviderCategory, SourceRecord, Stream,
    UserPreferences,
};
use crate::stream::ranking::rank;
use crate::stream::scheduler::Scheduler;

/// Source records for one episode plus the caller's preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolveRequest {
    pub source_records: Vec<SourceRecord>,
    pub preferences: UserPreferences,
}

/// Ranked, directly playable streams. Empty means nothing playable was
/// found, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub streams: Vec<Stream>,
}

impl ResolveResponse {
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// One `quality: url` line per stream, subtitles indented beneath.
    pub fn to_log_text(&self) -> String {
        let mut out = String::new();
        for stream in &self.streams {
            let _ = writeln!(out, "{}: {}", stream.quality_label, stream.url);
            for sub in &stream.subtitles {
                let _ = writeln!(out, "  Subtitle ({}): {}", sub.label, sub.url);
            }
        }
        out
    }
}

/// Resolves source records into ranked streams.
///
/// # Example
///
/// ```rust,no_run
/// use reel::{ReelConfig, ResolveRequest, Resolver};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let resolver = Resolver::new(ReelConfig::load()?)?;
///     let request: ResolveRequest = serde_json::from_str(&std::fs::read_to_string("ep.json")?)?;
///     let response = resolver.resolve(&request).await?;
///     print!("{}", response.to_log_text());
///     Ok(())
/// }
/// ```
pub struct Resolver {
    config: ReelConfig,
    ctx: HttpContext,
    classifier: Classifier,
    extractors: Extractors,
    scheduler: Scheduler,
    key_script: Arc<dyn KeyScriptFetcher>,
    browser_fallback: Option<Arc<dyn BrowserFallback>>,
}

impl Resolver {
    /// Build a resolver with the standard extractor set.
    pub fn new(config: ReelConfig) -> Result<Self, ResolveError> {
        config.validate()?;

        let ctx = HttpContext::new(&config.http)
            .map_err(|e| ResolveError::InvalidConfig(format!("http client: {e:#}")))?;
        let key_script: Arc<dyn KeyScriptFetcher> =
            Arc::new(HttpKeyScriptFetcher::new(config.megacloud.key_script_url.clone()));
        let extractors = Extractors::new(&config, key_script.clone(), None);

        Ok(Self {
            classifier: Classifier::new(config.internal.api_prefix.clone()),
            scheduler: Scheduler::new(config.scheduler.workers),
            ctx,
            extractors,
            key_script,
            browser_fallback: None,
            config,
        })
    }

    /// Use a different source for the encrypted-embed player script.
    #[must_use]
    pub fn with_key_script_fetcher(mut self, fetcher: Arc<dyn KeyScriptFetcher>) -> Self {
        self.key_script = fetcher;
        self.rebuild_megacloud();
        self
    }

    /// Install the browser-automation fallback for encrypted embeds.
    #[must_use]
    pub fn with_browser_fallback(mut self, fallback: Arc<dyn BrowserFallback>) -> Self {
        self.browser_fallback = Some(fallback);
        self.rebuild_megacloud();
        self
    }

    /// Replace the extractor for one category.
    #[must_use]
    pub fn with_extractor(
        mut self,
        category: ProviderCategory,
        extractor: Arc<dyn HosterExtractor>,
    ) -> Self {
        self.extractors.set(category, extractor);
        self
    }

    /// Override the worker count from config.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.scheduler = Scheduler::new(workers);
        self
    }

    fn rebuild_megacloud(&mut self) {
        let extractor = MegacloudExtractor::new(
            self.key_script.clone(),
            self.browser_fallback.clone(),
            self.config.megacloud.direct_attempts,
        );
        self.extractors.set_default(
            ProviderCategory::NamedProvider(NamedHoster::Megacloud),
            Arc::new(extractor),
        );
    }

    pub fn config(&self) -> &ReelConfig {
        &self.config
    }

    /// Decode and classify without any network access. Unmatched records are
    /// dropped.
    pub fn classify(&self, request: &ResolveRequest) -> Vec<ClassifiedServer> {
        self.classifier
            .classify_all(&request.source_records, &request.preferences)
    }

    /// Run the full pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NoSourceRecords`] when the request is empty.
    /// Provider failures never surface here.
    pub async fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResponse, ResolveError> {
        if request.source_records.is_empty() {
            return Err(ResolveError::NoSourceRecords);
        }

        let servers = self.classify(request);
        let classified = servers.len();
        let candidates = self.scheduler.run(servers, &self.extractors, &self.ctx).await;
        let streams = rank(candidates, &request.preferences);

        info!(
            records = request.source_records.len(),
            classified,
            streams = streams.len(),
            workers = self.scheduler.workers(),
            "resolution complete"
        );

        Ok(ResolveResponse { streams })
    }
}
