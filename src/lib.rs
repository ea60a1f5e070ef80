//! `reel` - resolve upstream episode sources into playable streams
//!
//! # Features
//!
//! - **Decoding**: XOR-hex source URLs, AES-CBC encrypted embed sources
//! - **Classification**: internal API servers, direct players, named hosters
//! - **Extraction**: bounded-concurrency fan-out with per-hoster failure isolation
//! - **Manifests**: HLS master/leaf playlists and DASH MPDs
//! - **Ranking**: stable preference-driven ordering
//!
//! # Example
//!
//! ```rust,no_run
//! use reel::{ReelConfig, ResolveRequest, Resolver, SourceRecord};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let resolver = Resolver::new(ReelConfig::default())?;
//!     let request = ResolveRequest {
//!         source_records: vec![SourceRecord::new(
//!             "https://ok.ru/videoembed/123",
//!             "Ok",
//!             "iframe",
//!             1.0,
//!         )],
//!         ..ResolveRequest::default()
//!     };
//!     for stream in resolver.resolve(&request).await?.streams {
//!         println!("{}: {}", stream.quality_label, stream.url);
//!     }
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod http_client;
pub mod resolver;
pub mod stream;

pub use codec::{decode_xor, decrypt_aes_sources, extract_key_fragments, KeyFragment, SourceFile};
pub use config::ReelConfig;
pub use error::{CodecError, ResolveError};
pub use fingerprint::{chrome_profile, firefox_profile, random_profile, BrowserProfile};
pub use http_client::{HttpContext, RetryPolicy};
pub use resolver::{ResolveRequest, ResolveResponse, Resolver};
pub use stream::{
    BrowserFallback, ClassifiedServer, HosterExtractor, KeyScriptFetcher, NamedHoster,
    ProviderCategory, SourceRecord, Stream, Track, UserPreferences,
};

/// Version of reel
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
