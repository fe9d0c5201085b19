//! Classifier configuration
//!
//! Keyword lists and scoring weights are data, loadable from TOML so they
//! can be tuned without touching the matching logic.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Keywords that may directly precede a code ("code: 1234")
pub const DEFAULT_OTP_KEYWORDS: &[&str] = &[
    "otp", "code", "verification", "passcode", "confirm", "reset", "password", "recovery",
];

/// Keywords signalling verification intent in a link
pub const DEFAULT_VERIFY_KEYWORDS: &[&str] = &[
    "confirm", "verify", "activate", "validate", "token", "reset", "password", "recovery",
    "auth", "login", "click",
];

/// Keywords marking a link as footer noise
pub const DEFAULT_IGNORE_KEYWORDS: &[&str] = &[
    "unsubscribe", "privacy", "terms", "opt-out", "preferences", "help", "support", "about",
];

/// Points per verify keyword found in a URL
pub const DEFAULT_URL_WEIGHT: u32 = 10;

/// Points per verify keyword found in anchor text
pub const DEFAULT_ANCHOR_WEIGHT: u32 = 15;

/// Bodies above this size are truncated before classification
pub const DEFAULT_MAX_BODY_BYTES: usize = 512 * 1024;

/// Errors from loading or compiling a classifier configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid keyword pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Keyword lists and weights driving the classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Keywords that may directly precede a 4-8 digit code
    pub otp_keywords: Vec<String>,
    /// Keywords that raise a link's score
    pub verify_keywords: Vec<String>,
    /// Keywords that discard a link outright
    pub ignore_keywords: Vec<String>,
    /// Score per verify keyword in the URL
    pub url_weight: u32,
    /// Score per verify keyword in the anchor text
    pub anchor_weight: u32,
    /// Per-body byte limit
    pub max_body_bytes: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            otp_keywords: to_owned_list(DEFAULT_OTP_KEYWORDS),
            verify_keywords: to_owned_list(DEFAULT_VERIFY_KEYWORDS),
            ignore_keywords: to_owned_list(DEFAULT_IGNORE_KEYWORDS),
            url_weight: DEFAULT_URL_WEIGHT,
            anchor_weight: DEFAULT_ANCHOR_WEIGHT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ClassifierConfig {
    /// Parse a TOML document; absent fields keep their defaults
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn with_otp_keywords(mut self, keywords: &[&str]) -> Self {
        self.otp_keywords = to_owned_list(keywords);
        self
    }

    pub fn with_verify_keywords(mut self, keywords: &[&str]) -> Self {
        self.verify_keywords = to_owned_list(keywords);
        self
    }

    pub fn with_ignore_keywords(mut self, keywords: &[&str]) -> Self {
        self.ignore_keywords = to_owned_list(keywords);
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

fn to_owned_list(keywords: &[&str]) -> Vec<String> {
    keywords.iter().map(|k| k.to_string()).collect()
}

/// Lowercase, trim and drop empty or duplicate keywords, keeping order
pub(crate) fn clean_keywords(keywords: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(keywords.len());
    for keyword in keywords {
        let keyword = keyword.trim().to_lowercase();
        if !keyword.is_empty() && !cleaned.contains(&keyword) {
            cleaned.push(keyword);
        }
    }
    cleaned
}
