//! Shared HTTP context for every extractor and manifest fetch.
//!
//! Features:
//! - One pooled `reqwest` client per resolver (rustls, HTTP/2, compression)
//! - Browser-like default headers
//! - Per-call connect and request timeouts
//! - One retry policy applied uniformly to every request
//!
//! The context is immutable once built. Extractors can add per-request
//! headers but never change the shared defaults. There is no cookie jar, so
//! a `Set-Cookie` from one hoster never reaches another.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, HOST};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::config::HttpConfig;
use crate::fingerprint::{random_profile, BrowserProfile};

/// Uniform retry policy for outbound requests.
///
/// Only connection failures and 5xx responses are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always at least 1.
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff_base: Duration::ZERO,
        }
    }

    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Immutable HTTP state shared by all extraction tasks of a resolver.
///
/// Cloning is cheap; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpContext {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    client: Client,
    profile: BrowserProfile,
    retry: RetryPolicy,
}

impl HttpContext {
    /// Build a context from config, choosing a random browser profile unless
    /// a User-Agent is pinned.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let profile = match &config.user_agent {
            Some(ua) => BrowserProfile::pinned(ua.clone()),
            None => random_profile(),
        };
        Self::with_profile(config, profile)
    }

    /// Build a context with a specific browser profile.
    pub fn with_profile(config: &HttpConfig, profile: BrowserProfile) -> Result<Self> {
        let client = Client::builder()
            // Let the server negotiate HTTP/2
            .http2_adaptive_window(true)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .brotli(true)
            .zstd(true)
            .gzip(true)
            .deflate(true)
            .default_headers(profile.to_headers())
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                profile,
                retry: RetryPolicy::new(
                    config.max_attempts,
                    Duration::from_millis(config.backoff_base_ms),
                ),
            }),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.retry
    }

    /// The identity headers every request carries.
    pub fn profile(&self) -> &BrowserProfile {
        &self.inner.profile
    }

    /// GET `url` with extra headers, applying the retry policy.
    ///
    /// Non-2xx responses are errors.
    #[instrument(skip(self, headers), fields(url = %url))]
    pub async fn get(&self, url: &str, headers: &BTreeMap<String, String>) -> Result<Response> {
        let extra = to_header_map(headers);
        let retry = self.inner.retry;
        let mut attempt = 1;

        loop {
            let result = self
                .inner
                .client
                .get(url)
                .headers(extra.clone())
                .send()
                .await;

            let retryable = match &result {
                Ok(response) => response.status().is_server_error(),
                Err(e) => e.is_connect(),
            };

            if retryable && attempt < retry.max_attempts {
                let delay = retry.delay_for(attempt);
                warn!(attempt, ?delay, "request failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let response = result.with_context(|| format!("GET {url} failed"))?;
            let status = response.status();
            debug!(%status, attempt, "response received");
            if !status.is_success() {
                bail!("GET {url} returned {status}");
            }
            return Ok(response);
        }
    }

    /// GET and return the body as text.
    pub async fn get_text(&self, url: &str, headers: &BTreeMap<String, String>) -> Result<String> {
        let response = self.get(url, headers).await?;
        response
            .text()
            .await
            .with_context(|| format!("failed to read body of {url}"))
    }

    /// GET and decode the body as JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<T> {
        let text = self.get_text(url, headers).await?;
        serde_json::from_str(&text).with_context(|| format!("invalid JSON from {url}"))
    }
}

/// Convert per-request headers, skipping `Host` (derived from the URL) and
/// anything that is not valid header text.
fn to_header_map(headers: &BTreeMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) else {
            debug!(header = %name, "skipping invalid header");
            continue;
        };
        if name == HOST {
            continue;
        }
        map.insert(name, value);
    }
    map
}
