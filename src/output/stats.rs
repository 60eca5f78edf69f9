//! Statistics generation from the crawl database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::state::{PendingKind, PendingStatus, QueueStatus};
use crate::storage::{RunRecord, Storage};
use crate::ScoutError;
use std::collections::HashMap;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Most recent run, if any
    pub latest_run: Option<RunRecord>,

    /// Total number of queue items
    pub total_queue_items: u64,

    /// Count of queue items by status
    pub queue_by_status: HashMap<QueueStatus, u64>,

    /// Stored responses
    pub total_responses: u64,

    /// Spider rows still waiting
    pub pending_spider: u64,

    /// Render rows still waiting
    pub pending_render: u64,

    /// Renderer discoveries not yet converted
    pub pending_analysis: u64,
}

impl CrawlStatistics {
    /// Returns the count for one queue status
    pub fn queue_count(&self, status: QueueStatus) -> u64 {
        self.queue_by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(ScoutError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<CrawlStatistics, ScoutError> {
    let mut queue_by_status = HashMap::new();
    for status in QueueStatus::all_states() {
        queue_by_status.insert(status, storage.count_queue_by_status(status)?);
    }

    Ok(CrawlStatistics {
        latest_run: storage.get_latest_run()?,
        total_queue_items: storage.count_queue_items()?,
        queue_by_status,
        total_responses: storage.count_responses()?,
        pending_spider: storage.count_pending_responses(PendingKind::Spider, PendingStatus::Pending)?,
        pending_render: storage.count_pending_responses(PendingKind::Render, PendingStatus::Pending)?,
        pending_analysis: storage.count_pending_analysis()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    if let Some(run) = &stats.latest_run {
        println!("Latest run: #{} ({})", run.id, run.status.to_db_string());
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!();
    }

    println!("Queue:");
    println!("  Total requests discovered: {}", stats.total_queue_items);
    for status in QueueStatus::all_states() {
        let count = stats.queue_count(status);
        let percentage = if stats.total_queue_items > 0 {
            (count as f64 / stats.total_queue_items as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    println!("Responses stored: {}", stats.total_responses);
    println!();

    println!("Pending analysis:");
    println!("  Spider: {}", stats.pending_spider);
    println!("  Render: {}", stats.pending_render);
    println!("  Renderer discoveries: {}", stats.pending_analysis);
}
