//! Resolver configuration loaded from `~/.config/reel/config.toml`.
//!
//! Every section and key is optional; anything missing falls back to the
//! defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ResolveError;
use crate::stream::provider::UserPreferences;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReelConfig {
    pub scheduler: SchedulerConfig,
    pub http: HttpConfig,
    pub internal: InternalConfig,
    pub megacloud: MegacloudConfig,
    pub preferences: UserPreferences,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Extraction tasks allowed in flight at once.
    pub workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { workers: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Whole-request timeout applied to every network call.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Total attempts per request, including the first. `1` disables retries.
    pub max_attempts: u32,
    /// First retry delay; doubles on each further attempt.
    pub backoff_base_ms: u64,
    /// Pin a User-Agent instead of a randomized browser profile.
    pub user_agent: Option<String>,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            connect_timeout_secs: 10,
            max_attempts: 1,
            backoff_base_ms: 500,
            user_agent: None,
        }
    }
}

/// The content site's own streaming API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InternalConfig {
    /// Origin serving the `/getVersion` endpoint.
    pub site_url: String,
    /// Path prefix that marks a decoded URL as an internal API path.
    pub api_prefix: String,
}

impl Default for InternalConfig {
    fn default() -> Self {
        Self {
            site_url: "https://allanime.to".to_string(),
            api_prefix: "/apivtwo/".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MegacloudConfig {
    /// Minified player script holding the AES key fragments.
    pub key_script_url: String,
    /// Direct decrypt attempts before the browser fallback is consulted.
    pub direct_attempts: u32,
}

impl Default for MegacloudConfig {
    fn default() -> Self {
        Self {
            key_script_url: "https://megacloud.tv/js/player/a/prod/e1-player.min.js".to_string(),
            direct_attempts: 2,
        }
    }
}

impl ReelConfig {
    /// Load from the default config path.
    ///
    /// Returns defaults if the file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from an explicit path, falling back to defaults when it is absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        let config: Self =
            toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))?;

        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ResolveError> {
        if self.scheduler.workers == 0 {
            return Err(ResolveError::InvalidConfig(
                "scheduler.workers must be at least 1".to_string(),
            ));
        }
        if self.http.max_attempts == 0 {
            return Err(ResolveError::InvalidConfig(
                "http.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.megacloud.direct_attempts == 0 {
            return Err(ResolveError::InvalidConfig(
                "megacloud.direct_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Return the path to the config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reel")
        .join("config.toml")
}
