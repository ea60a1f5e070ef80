//! Per-category stream extractors.
//!
//! Each [`ProviderCategory`] variant maps to exactly one extractor, chosen
//! once when a server is dispatched.

pub mod internal;
pub mod megacloud;
pub mod mp4upload;
pub mod okru;
pub mod player;
pub mod unsupported;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub use internal::InternalExtractor;
pub use megacloud::MegacloudExtractor;
pub use mp4upload::Mp4uploadExtractor;
pub use okru::OkruExtractor;
pub use player::PlayerExtractor;
pub use unsupported::UnsupportedExtractor;

use url::Url;

use crate::config::ReelConfig;
use crate::http_client::HttpContext;
use crate::stream::fallback::{BrowserFallback, KeyScriptFetcher};
use crate::stream::manifest::{resolve_manifest, ManifestKind, StreamTemplate};
pub(crate) use crate::stream::manifest::authority_of;
use crate::stream::provider::{HosterExtractor, NamedHoster, ProviderCategory, Stream};

/// Registry mapping provider categories to extractors.
#[derive(Clone)]
pub struct Extractors {
    defaults: HashMap<ProviderCategory, Arc<dyn HosterExtractor>>,
    overrides: HashMap<ProviderCategory, Arc<dyn HosterExtractor>>,
}

impl Extractors {
    /// Build the standard extractor set.
    pub fn new(
        config: &ReelConfig,
        key_script: Arc<dyn KeyScriptFetcher>,
        browser_fallback: Option<Arc<dyn BrowserFallback>>,
    ) -> Self {
        let mut defaults: HashMap<ProviderCategory, Arc<dyn HosterExtractor>> = HashMap::new();
        defaults.insert(
            ProviderCategory::Internal,
            Arc::new(InternalExtractor::new(config.internal.site_url.clone())),
        );
        defaults.insert(ProviderCategory::Player, Arc::new(PlayerExtractor));

        for hoster in NamedHoster::ALL {
            let extractor: Arc<dyn HosterExtractor> = match hoster {
                NamedHoster::Okru => Arc::new(OkruExtractor),
                NamedHoster::Mp4upload => Arc::new(Mp4uploadExtractor),
                NamedHoster::Megacloud => Arc::new(MegacloudExtractor::new(
                    key_script.clone(),
                    browser_fallback.clone(),
                    config.megacloud.direct_attempts,
                )),
                other => Arc::new(UnsupportedExtractor::new(other)),
            };
            defaults.insert(ProviderCategory::NamedProvider(hoster), extractor);
        }

        Self {
            defaults,
            overrides: HashMap::new(),
        }
    }

    /// Replace the extractor for one category.
    pub fn set(&mut self, category: ProviderCategory, extractor: Arc<dyn HosterExtractor>) {
        self.overrides.insert(category, extractor);
    }

    /// Replace the default (non-overridden) extractor for one category.
    pub(crate) fn set_default(
        &mut self,
        category: ProviderCategory,
        extractor: Arc<dyn HosterExtractor>,
    ) {
        self.defaults.insert(category, extractor);
    }

    /// Extractor for a category; `None` for [`ProviderCategory::Unmatched`].
    pub fn for_category(&self, category: ProviderCategory) -> Option<Arc<dyn HosterExtractor>> {
        self.overrides
            .get(&category)
            .or_else(|| self.defaults.get(&category))
            .cloned()
    }
}

/// Prefix scheme-relative (`//host/...`) links with `https:`.
pub(crate) fn absolute_url(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{url}")
    } else {
        url.to_string()
    }
}

/// `scheme://host[:port]` of a URL.
pub(crate) fn origin_of(url: &str) -> Option<String> {
    let origin = Url::parse(url).ok()?.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

/// Origin/Referer from `origin`, Host from the target's own authority.
pub(crate) fn origin_headers(origin: &str, target: &str) -> BTreeMap<String, String> {
    let origin = origin.trim_end_matches('/');
    let mut headers = BTreeMap::new();
    headers.insert("Origin".to_string(), origin.to_string());
    headers.insert("Referer".to_string(), format!("{origin}/"));
    if let Some(host) = authority_of(target) {
        headers.insert("Host".to_string(), host);
    }
    headers
}

/// Headers a player needs for a link served by its own host.
pub(crate) fn self_headers(target: &str) -> BTreeMap<String, String> {
    origin_of(target).map_or_else(BTreeMap::new, |origin| origin_headers(&origin, target))
}

/// Feed a decoded URL straight to the manifest parsers when it is already
/// an `.m3u8` / `.mpd` link.
pub(crate) async fn direct_manifest<F>(
    ctx: &HttpContext,
    url: &str,
    provider_tag: &str,
    name_gen: F,
) -> Option<Vec<Stream>>
where
    F: Fn(&str) -> String + Send + Sync,
{
    let kind = ManifestKind::detect(url)?;
    let template = StreamTemplate::new(provider_tag).with_headers(self_headers(url));
    Some(resolve_manifest(ctx, kind, url, name_gen, &template).await)
}
