//! Configuration for the dashboard's data layer.
//!
//! # Example
//!
//! ```
//! use f1_dash::DashConfig;
//!
//! // Defaults: local SQLite file, local Redis, one hour TTL
//! let config = DashConfig::default();
//! assert_eq!(config.db_path, "f1_data.db");
//! assert_eq!(config.cache_ttl_secs, 3600);
//!
//! // Memory cache only
//! let config = DashConfig {
//!     cache_url: None,
//!     cache_ttl_secs: 600,
//!     ..Default::default()
//! };
//! assert_eq!(config.cache_ttl().as_secs(), 600);
//! ```

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}'")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashConfig {
    /// SQLite database file (created if missing)
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Redis URL. `None` (or empty) selects the in-memory cache.
    #[serde(default = "default_cache_url")]
    pub cache_url: Option<String>,

    /// Cache TTL for sessions and telemetry. Schedules live 24x longer.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Per-request timeout against the upstream API
    #[serde(default = "default_api_timeout_secs")]
    pub api_timeout_secs: u64,

    /// Budget for the single Redis connect + PING at startup
    #[serde(default = "default_cache_connect_timeout_ms")]
    pub cache_connect_timeout_ms: u64,
}

fn default_db_path() -> String { "f1_data.db".to_string() }
fn default_cache_url() -> Option<String> { Some("redis://localhost:6379".to_string()) }
fn default_cache_ttl_secs() -> u64 { 3600 } // 1 hour
fn default_api_url() -> String { crate::remote::DEFAULT_BASE_URL.to_string() }
fn default_api_timeout_secs() -> u64 { 30 }
fn default_cache_connect_timeout_ms() -> u64 { 1500 }

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_url: default_cache_url(),
            cache_ttl_secs: default_cache_ttl_secs(),
            api_url: default_api_url(),
            api_timeout_secs: default_api_timeout_secs(),
            cache_connect_timeout_ms: default_cache_connect_timeout_ms(),
        }
    }
}

impl DashConfig {
    /// Read `DB_PATH`, `CACHE_URL`, `CACHE_TTL`, `F1_API_URL`,
    /// `F1_API_TIMEOUT` and `CACHE_CONNECT_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("DB_PATH").filter(|p| !p.trim().is_empty()) {
            config.db_path = path;
        }
        if let Some(url) = lookup("CACHE_URL") {
            // Set but empty disables Redis
            let url = url.trim().to_string();
            config.cache_url = if url.is_empty() { None } else { Some(url) };
        }
        if let Some(ttl) = parse_u64(&lookup, "CACHE_TTL")? {
            config.cache_ttl_secs = ttl;
        }
        if let Some(url) = lookup("F1_API_URL").filter(|u| !u.trim().is_empty()) {
            config.api_url = url.trim().to_string();
        }
        if let Some(timeout) = parse_u64(&lookup, "F1_API_TIMEOUT")? {
            config.api_timeout_secs = timeout;
        }
        if let Some(ms) = parse_u64(&lookup, "CACHE_CONNECT_TIMEOUT_MS")? {
            config.cache_connect_timeout_ms = ms;
        }

        Ok(config)
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    #[must_use]
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    #[must_use]
    pub fn cache_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_connect_timeout_ms)
    }
}

fn parse_u64<F>(lookup: &F, var: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}
