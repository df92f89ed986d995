//! Configuration for the scanner service.
//!
//! A single JSON file, by default at
//! `<config dir>/hqm-scanner/config.json`, with every field optional.
//!
//! # Configuration Priority
//!
//! 1. Explicit config file values
//! 2. Environment variables (HQM_* prefix)
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `HQM_PORT` → server.port
//! - `HQM_DB_PATH` → store.db_path
//! - `HQM_UPSTREAM_URL` → upstream.base_url
//! - `HQM_UPSTREAM_TOKEN` → upstream.token
//! - `HQM_LOG_LEVEL` → observability.log_level

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{StoreConfig, UpstreamConfig};

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hqm-scanner")
        .join("config.json")
}

// ============================================================================
// Server Configuration
// ============================================================================

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address. Default: "127.0.0.1" (local only)
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    4490
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

// ============================================================================
// Universe Configuration
// ============================================================================

/// Which tickers a refresh pulls from upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseConfig {
    /// Exchanges to list
    #[serde(default = "default_exchanges")]
    pub exchanges: Vec<String>,

    /// Market-cap floor in dollars
    #[serde(default = "default_min_market_cap")]
    pub min_market_cap: f64,

    /// Calendar days of daily closes to request; must comfortably
    /// cover the 253 trading-day window the 1-year horizon needs
    #[serde(default = "default_history_days")]
    pub history_days: u32,
}

fn default_exchanges() -> Vec<String> {
    vec!["NYSE".into(), "NASDAQ".into()]
}

fn default_min_market_cap() -> f64 {
    2_000_000_000.0
}

fn default_history_days() -> u32 {
    380
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            exchanges: default_exchanges(),
            min_market_cap: default_min_market_cap(),
            history_days: default_history_days(),
        }
    }
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Base log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream market-data API
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Local snapshot cache
    #[serde(default)]
    pub store: StoreConfig,

    /// Refresh universe selection
    #[serde(default)]
    pub universe: UniverseConfig,

    /// Refresh automatically when the cache is older than this many
    /// hours. None disables the background worker.
    #[serde(default)]
    pub auto_refresh_hours: Option<u64>,

    /// Logging
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path, falling back to
    /// defaults when no file exists.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable fallbacks.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("HQM_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(path) = std::env::var("HQM_DB_PATH") {
            self.store.db_path = PathBuf::from(path);
        }
        if let Ok(url) = std::env::var("HQM_UPSTREAM_URL") {
            self.upstream.base_url = url;
        }
        if let Ok(token) = std::env::var("HQM_UPSTREAM_TOKEN") {
            self.upstream.token = token;
        }
        if let Ok(level) = std::env::var("HQM_LOG_LEVEL") {
            self.observability.log_level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.server.port, 4490);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.universe.exchanges, vec!["NYSE", "NASDAQ"]);
        assert_eq!(config.observability.log_level, "info");
        assert!(config.auto_refresh_hours.is_none());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"server": {"port": 9999}, "auto_refresh_hours": 24}"#)
                .unwrap();
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.auto_refresh_hours, Some(24));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"upstream": {{"base_url": "https://data.example.com", "token": "t0k3n"}}}}"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.upstream.base_url, "https://data.example.com");
        assert_eq!(config.upstream.token, "t0k3n");
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        assert!(Config::load_from(Path::new("/nonexistent/config.json")).is_err());
    }

    #[test]
    fn test_config_round_trips() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.server.port, config.server.port);
        assert_eq!(back.universe.min_market_cap, config.universe.min_market_cap);
    }
}
