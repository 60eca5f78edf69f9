//! Scoutline: crawl orchestration for web security testing
//!
//! This crate discovers reachable resources (links, forms, redirect targets,
//! script-embedded URLs) inside a configured scope, schedules requests for them
//! under a concurrency budget and a link-depth bound, and feeds freshly fetched
//! content back into discovery.

pub mod config;
pub mod crawler;
pub mod dispatcher;
pub mod extract;
pub mod frontier;
pub mod output;
pub mod scope;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Scoutline operations
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] dispatcher::TransportError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] extract::ExtractError),

    #[error("Lock poisoned: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
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

    #[error("Invalid scope pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Scoutline operations
pub type Result<T> = std::result::Result<T, ScoutError>;

impl<T> From<std::sync::PoisonError<T>> for ScoutError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        ScoutError::Lock(err.to_string())
    }
}

// Re-export commonly used types
pub use config::Config;
pub use scope::{ScopeFilter, SharedScope};
pub use state::{AnalysisKind, PendingKind, PendingStatus, QueueStatus};
pub use url::{dedup_key, normalize_url};
