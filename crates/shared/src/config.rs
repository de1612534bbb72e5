//! Configuration management for the catalog gateway.
//!
//! This module handles loading and parsing configuration from TOML files,
//! with sensible defaults for all settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory settings
    pub data: DataConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Remote catalog settings
    pub catalog: CatalogConfig,
}

/// Data directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root data directory path
    pub root_dir: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log directory path (relative to data directory or absolute)
    pub log_dir: String,

    /// Default log level (trace, debug, info, warn, error)
    pub default_level: String,

    /// Enable console output
    pub console: bool,

    /// Enable file output
    pub file: bool,

    /// Enable JSON formatting for file logs
    pub json_format: bool,
}

impl LoggingConfig {
    /// Parse `default_level`, falling back to INFO on unknown values
    pub fn level(&self) -> Level {
        self.default_level.parse().unwrap_or(Level::INFO)
    }
}

/// Remote catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Catalog API base URL (scheme and host, plus any fixed path prefix)
    pub base_url: String,

    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,

    /// User agent sent with every request
    pub user_agent: String,

    /// Request pacing settings
    pub rate_limit: RateLimitConfig,

    /// Cache settings
    pub cache: CacheConfig,
}

/// Request pacing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Wait between two consecutive requests, before any throttling
    pub min_interval_ms: u64,

    /// Upper bound for the wait after repeated throttling
    pub max_delay_ms: u64,

    /// Total attempts per request when the server answers 429
    pub max_attempts: u32,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Use the durable SQLite store (otherwise an in-memory store)
    pub enabled: bool,

    /// Cache database file (relative to data directory or absolute)
    pub path: String,

    /// Reserved prefix for every key the gateway owns
    pub key_prefix: String,

    /// TTL for listings and searches
    pub listing_ttl_minutes: i64,

    /// TTL for single-title details and news
    pub details_ttl_minutes: i64,

    /// TTL for genre lists
    pub genres_ttl_minutes: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 1000,
            max_delay_ms: 10_000,
            max_attempts: 3,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "cache.db".to_string(),
            key_prefix: "jikan_".to_string(),
            listing_ttl_minutes: 30,
            details_ttl_minutes: 60,
            genres_ttl_minutes: 24 * 60,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig {
                root_dir: "data".to_string(),
            },
            logging: LoggingConfig {
                log_dir: "logs".to_string(),
                default_level: "info".to_string(),
                console: true,
                file: true,
                json_format: false,
            },
            catalog: CatalogConfig {
                base_url: "https://api.jikan.moe/v4".to_string(),
                request_timeout_secs: 30,
                user_agent: "catalog-gateway/0.1.0".to_string(),
                rate_limit: RateLimitConfig::default(),
                cache: CacheConfig::default(),
            },
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// If the file doesn't exist, returns the default configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Get the absolute path for the data directory
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data.root_dir)
    }

    /// Get the absolute path for the log directory
    pub fn log_dir(&self) -> PathBuf {
        self.resolve(&self.logging.log_dir)
    }

    /// Get the absolute path for the cache database
    pub fn cache_path(&self) -> PathBuf {
        self.resolve(&self.catalog.cache.path)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir().join(path)
        }
    }
}
