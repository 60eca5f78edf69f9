//! Output module for crawl statistics
//!
//! This module handles loading queue, response and pending-work counts from
//! storage and printing them.

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};
