//! Browser-like request identity.
//!
//! Embed hosts reject obvious bot traffic, so every [`HttpContext`]
//! (crate::http_client::HttpContext) is built with a desktop browser
//! profile picked once per resolver. The profile is never mutated after the
//! client is constructed.

use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};

/// Real Chrome versions (major, full).
const CHROME_VERSIONS: &[(&str, &str)] = &[
    ("131", "131.0.0.0"),
    ("130", "130.0.0.0"),
    ("129", "129.0.0.0"),
    ("128", "128.0.0.0"),
];

const FIREFOX_VERSIONS: &[&str] = &["133.0", "132.0", "131.0"];

const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.9",
    "en-US,en;q=0.9,ja;q=0.8",
    "en-US,en;q=0.9,de;q=0.8",
];

/// Desktop platform a profile claims to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOS,
    Windows,
    Linux,
}

impl Platform {
    fn random() -> Self {
        // Windows 65%, macOS 20%, Linux 15%
        let roll: f32 = rand::thread_rng().gen();
        if roll < 0.65 {
            Platform::Windows
        } else if roll < 0.85 {
            Platform::MacOS
        } else {
            Platform::Linux
        }
    }

    fn os_string(self) -> &'static str {
        match self {
            Platform::MacOS => "Macintosh; Intel Mac OS X 10_15_7",
            Platform::Windows => "Windows NT 10.0; Win64; x64",
            Platform::Linux => "X11; Linux x86_64",
        }
    }
}

/// Identity headers sent with every outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserProfile {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
}

impl BrowserProfile {
    /// Profile with a caller-pinned User-Agent.
    pub fn pinned(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            accept: "*/*".to_string(),
            accept_language: ACCEPT_LANGUAGES[0].to_string(),
        }
    }

    /// Convert profile to reqwest `HeaderMap`.
    ///
    /// Values that are not valid header text are skipped.
    pub fn to_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in [
            (USER_AGENT, &self.user_agent),
            (ACCEPT, &self.accept),
            (ACCEPT_LANGUAGE, &self.accept_language),
        ] {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.insert(name, value);
            }
        }
        headers
    }
}

/// Generate a Chrome desktop profile.
#[must_use]
pub fn chrome_profile() -> BrowserProfile {
    let mut rng = rand::thread_rng();
    let platform = Platform::random();
    let (_, full) = CHROME_VERSIONS
        .choose(&mut rng)
        .copied()
        .unwrap_or(("131", "131.0.0.0"));

    BrowserProfile {
        user_agent: format!(
            "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{full} Safari/537.36",
            platform.os_string()
        ),
        accept: "*/*".to_string(),
        accept_language: random_accept_language(),
    }
}

/// Generate a Firefox desktop profile.
#[must_use]
pub fn firefox_profile() -> BrowserProfile {
    let mut rng = rand::thread_rng();
    let platform = Platform::random();
    let version = FIREFOX_VERSIONS.choose(&mut rng).copied().unwrap_or("133.0");

    BrowserProfile {
        user_agent: format!(
            "Mozilla/5.0 ({}; rv:{version}) Gecko/20100101 Firefox/{version}",
            platform.os_string()
        ),
        accept: "*/*".to_string(),
        accept_language: random_accept_language(),
    }
}

/// Random desktop profile, weighted toward Chrome.
#[must_use]
pub fn random_profile() -> BrowserProfile {
    let roll: f32 = rand::thread_rng().gen();
    if roll < 0.8 {
        chrome_profile()
    } else {
        firefox_profile()
    }
}

fn random_accept_language() -> String {
    ACCEPT_LANGUAGES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("en-US,en;q=0.9")
        .to_string()
}
