//! Configuration module for Scoutline
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use scoutline::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Crawler will use max link depth: {}", config.crawler.max_link_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, OutputConfig, ScopeConfig, SeedConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, config_hash, load_config, load_config_with_hash, parse_config};
