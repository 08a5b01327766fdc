//! Handbook-Harvest: a bounded concurrent page fetcher
//!
//! This crate fetches one page per identifier from a URL prefix, retries
//! each fetch until it succeeds, and stores the raw response body in an
//! output directory under a name derived from the identifier.

pub mod config;
pub mod crawler;
pub mod input;
pub mod output;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Handbook-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to create output directory {}: {source}", .path.display())]
    CreateOutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read identifier list {}: {source}", .path.display())]
    ReadList {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Handbook-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Dispatcher, FetchJob, JobOutcome};
pub use output::CrawlReport;
