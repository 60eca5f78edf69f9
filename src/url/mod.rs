//! URL handling module for Scoutline
//!
//! This module provides URL normalization for frontier deduplication and
//! host/IP helpers used by the scope filter.

mod domain;
mod normalize;

// Re-export main functions
pub use domain::{extract_host, host_ip, same_host};
pub use normalize::{dedup_key, normalize_parsed, normalize_url, split_query};
