//! Collector configuration.
//!
//! Defaults match the behaviour callers rely on: ten attempts per page,
//! backoff scaled by one second, no deadline, ambient client configuration
//! under `awsConfig`.

use crate::engine::RetryPolicy;
use crate::types::{CollectorError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable for [`CollectorConfig::max_attempts`].
pub const ENV_MAX_ATTEMPTS: &str = "COLLECTOR_MAX_ATTEMPTS";
/// Environment variable for [`CollectorConfig::retry_interval_ms`].
pub const ENV_RETRY_INTERVAL_MS: &str = "COLLECTOR_RETRY_INTERVAL_MS";
/// Environment variable for [`CollectorConfig::deadline_secs`].
pub const ENV_DEADLINE_SECS: &str = "COLLECTOR_DEADLINE_SECS";
/// Environment variable for [`CollectorConfig::ambient_key`].
pub const ENV_AMBIENT_KEY: &str = "COLLECTOR_AMBIENT_KEY";

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Total remote call attempts per page
    pub max_attempts: u32,

    /// Backoff scale; the delay after attempt `t` is `t * U(0,1) * interval`
    pub retry_interval_ms: u64,

    /// Wall-clock bound on one top-level request
    pub deadline_secs: Option<u64>,

    /// Parameter key lifted out of caller params into the ambient client configuration
    pub ambient_key: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            retry_interval_ms: 1000,
            deadline_secs: None,
            ambient_key: "awsConfig".to_string(),
        }
    }
}

impl CollectorConfig {
    /// Defaults overridden by `COLLECTOR_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::ConfigError` if a variable is set but invalid
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by values from `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::ConfigError` if a value does not parse
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(value) = parse_var(&lookup, ENV_MAX_ATTEMPTS)? {
            config.max_attempts = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_RETRY_INTERVAL_MS)? {
            config.retry_interval_ms = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_DEADLINE_SECS)? {
            config.deadline_secs = Some(value);
        }
        if let Some(value) = lookup(ENV_AMBIENT_KEY) {
            config.ambient_key = value;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML or JSON file.
    ///
    /// Files ending in `.json` are parsed as JSON, anything else as YAML.
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::IoError` if the file cannot be read, or
    /// `CollectorError::ConfigError` if it does not parse or validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));

        let config: Self = if is_json {
            serde_json::from_str(&content)
                .map_err(|e| CollectorError::config(format!("Invalid config {}: {}", path.display(), e)))?
        } else {
            serde_yaml::from_str(&content)
                .map_err(|e| CollectorError::config(format!("Invalid config {}: {}", path.display(), e)))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::ConfigError` for zero attempts, a zero
    /// deadline or an empty ambient key
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(CollectorError::config("max_attempts must be at least 1"));
        }
        if self.deadline_secs == Some(0) {
            return Err(CollectorError::config("deadline_secs must be positive"));
        }
        if self.ambient_key.is_empty() {
            return Err(CollectorError::config("ambient_key must not be empty"));
        }
        Ok(())
    }

    /// Page retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_interval_ms))
    }

    /// Request deadline, if configured.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| CollectorError::config(format!("{}={:?}: {}", key, raw, e))),
        None => Ok(None),
    }
}
