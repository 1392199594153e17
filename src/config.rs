//! Configuration file parser for ~/.config/gdacs-feed/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning for each one
//! since they are usually typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::feed::{FeedFilter, FetchOptions, DEFAULT_URL};
use crate::util::validate_feed_url;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A value parsed but is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feed URL.
    pub url: String,

    /// Home latitude in degrees.
    pub latitude: f64,

    /// Home longitude in degrees.
    pub longitude: f64,

    /// Only keep entries within this many kilometres of home.
    pub filter_radius_km: Option<f64>,

    /// Only keep entries in these categories (e.g. "Drought", "Earthquake").
    /// An empty list keeps every category.
    pub filter_categories: Option<Vec<String>>,

    /// Minutes between polls in the binary's loop.
    pub refresh_interval_minutes: u64,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Retries after a 429 or 5xx answer.
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            latitude: 0.0,
            longitude: 0.0,
            filter_radius_km: None,
            filter_categories: None,
            refresh_interval_minutes: 5,
            request_timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 8] = [
        "url",
        "latitude",
        "longitude",
        "filter_radius_km",
        "filter_categories",
        "refresh_interval_minutes",
        "request_timeout_secs",
        "max_retries",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    ///
    /// Values are not range-checked here; call [`Config::validate`] once
    /// command-line overrides have been applied.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            path = %path.display(),
            latitude = config.latitude,
            longitude = config.longitude,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Range-checks every value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ConfigError::Invalid(format!(
                "latitude {} is outside [-90, 90]",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ConfigError::Invalid(format!(
                "longitude {} is outside [-180, 180]",
                self.longitude
            )));
        }
        if let Some(radius) = self.filter_radius_km {
            if !radius.is_finite() || radius < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "filter_radius_km {} must be a non-negative number",
                    radius
                )));
            }
        }
        if let Some(categories) = &self.filter_categories {
            if categories.iter().any(|c| c.trim().is_empty()) {
                return Err(ConfigError::Invalid(
                    "filter_categories contains an empty name".to_string(),
                ));
            }
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        validate_feed_url(&self.url)
            .map_err(|e| ConfigError::Invalid(format!("url {:?}: {}", self.url, e)))?;
        Ok(())
    }

    pub fn home(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    pub fn filter(&self) -> FeedFilter {
        FeedFilter {
            radius_km: self.filter_radius_km,
            categories: self
                .filter_categories
                .clone()
                .filter(|categories| !categories.is_empty()),
        }
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: Duration::from_secs(self.request_timeout_secs),
            max_retries: self.max_retries,
        }
    }

    /// Poll cadence; `None` when `refresh_interval_minutes` is 0 (poll once).
    pub fn refresh_interval(&self) -> Option<Duration> {
        match self.refresh_interval_minutes {
            0 => None,
            minutes => Some(Duration::from_secs(minutes.saturating_mul(60))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
