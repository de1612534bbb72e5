//! Shared library for the catalog gateway workspace.
//!
//! This crate provides common functionality used across binary crates:
//! - Configuration management
//! - Logging infrastructure

pub mod config;
pub mod logging;

// Re-export commonly used types
pub use config::{CacheConfig, CatalogConfig, Config, RateLimitConfig};
pub use logging::LogConfig;

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
