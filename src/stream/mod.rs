//! Stream resolution pipeline
//!
//! Decode and classify upstream source records, extract streams from each
//! hoster concurrently, expand HLS/DASH manifests, then rank.

pub mod classify;
pub mod extractors;
pub mod fallback;
pub mod manifest;
pub mod provider;
pub mod ranking;
pub mod scheduler;

pub use classify::Classifier;
pub use extractors::Extractors;
pub use fallback::{BrowserFallback, HttpKeyScriptFetcher, KeyScriptFetcher, StaticKeyScript};
pub use provider::{
    ClassifiedServer, HosterExtractor, NamedHoster, ProviderCategory, SourceRecord, Stream, Track,
    UserPreferences,
};
pub use ranking::{rank, Candidate};
pub use scheduler::{ExtractionRun, Phase, Scheduler};
