//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{AnalysisKind, PendingKind, PendingStatus, QueueStatus};
use crate::storage::{
    NewQueueItem, NewResponse, PendingAnalysis, PendingResponse, QueueItem, RunRecord, RunStatus,
    StoredResponse,
};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Queue item not found: {0}")]
    QueueItemNotFound(i64),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Invalid queue transition: {from:?} -> {to:?}")]
    InvalidTransition { from: QueueStatus, to: QueueStatus },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the frontier and the
/// crawl driver. Callers serialize access (the frontier holds its storage
/// behind one mutex), so implementations need not be internally synchronized.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&mut self, run_id: i64) -> StorageResult<()>;

    // ===== Queue Items =====

    /// Inserts a queue item in `Pending` state
    ///
    /// # Returns
    ///
    /// * `Some(id)` - The new item's ID
    /// * `None` - An item with the same dedup key already exists
    fn insert_queue_item(&mut self, item: &NewQueueItem, run_id: i64)
        -> StorageResult<Option<i64>>;

    /// Gets a queue item by ID
    fn get_queue_item(&self, id: i64) -> StorageResult<QueueItem>;

    /// Finds the queue item holding a dedup key, whatever its status
    fn find_queue_item(&self, dedup_key: &str) -> StorageResult<Option<QueueItem>>;

    /// Returns the oldest `Pending` item, shallowest depth first
    fn next_pending_queue_item(&self) -> StorageResult<Option<QueueItem>>;

    /// Moves a queue item to a new status
    ///
    /// Fails with `InvalidTransition` if the move is not allowed from the
    /// item's current status.
    fn update_queue_status(&mut self, id: i64, status: QueueStatus) -> StorageResult<()>;

    /// Resets items left `Dispatched` by an interrupted run to `Pending`
    ///
    /// Returns the number of items reset
    fn reset_dispatched_items(&mut self) -> StorageResult<usize>;

    /// Counts every queue item
    fn count_queue_items(&self) -> StorageResult<u64>;

    /// Counts queue items in a status
    fn count_queue_by_status(&self, status: QueueStatus) -> StorageResult<u64>;

    /// Counts queue items discovered from a referer
    fn count_children(&self, referer_url: &str) -> StorageResult<u64>;

    /// Counts distinct query strings queued for a method and target
    fn count_query_variants(&self, method: &str, target_url: &str) -> StorageResult<u64>;

    // ===== Response Store =====

    /// Stores a response
    ///
    /// # Returns
    ///
    /// The ID of the stored response
    fn insert_response(&mut self, response: &NewResponse) -> StorageResult<i64>;

    /// Reads a response by ID
    fn read_response_by_id(&self, id: i64) -> StorageResult<Option<StoredResponse>>;

    /// Reads every response stored for a URL, oldest first
    fn read_responses_by_url(&self, url: &str) -> StorageResult<Vec<StoredResponse>>;

    /// Finds a 2xx response with a non-empty body for this exact method and URL
    fn find_found_response(&self, method: &str, url: &str)
        -> StorageResult<Option<StoredResponse>>;

    /// Counts stored responses
    fn count_responses(&self) -> StorageResult<u64>;

    // ===== Pending Responses =====

    /// Makes sure a pending row exists for a response and kind
    ///
    /// A new row starts `Pending`. An existing row reached again at a
    /// shallower depth is reopened at that depth; otherwise it is left alone.
    ///
    /// # Returns
    ///
    /// True if a row was created or reopened
    fn ensure_pending_response(
        &mut self,
        response_id: i64,
        kind: PendingKind,
        depth: u32,
    ) -> StorageResult<bool>;

    /// Returns the next `Pending` row of a kind, shallowest first, skipping `claimed` ids
    fn next_pending_response(
        &self,
        kind: PendingKind,
        claimed: &HashSet<i64>,
    ) -> StorageResult<Option<PendingResponse>>;

    /// Marks a pending row `Complete` if it still holds `claimed_depth`
    ///
    /// A row reopened at a shallower depth after it was claimed stays `Pending`.
    ///
    /// # Returns
    ///
    /// True if the row was completed
    fn complete_pending_response(
        &mut self,
        response_id: i64,
        kind: PendingKind,
        claimed_depth: u32,
    ) -> StorageResult<bool>;

    /// Counts pending rows of a kind in a status
    fn count_pending_responses(
        &self,
        kind: PendingKind,
        status: PendingStatus,
    ) -> StorageResult<u64>;

    // ===== Pending Analysis =====

    /// Records deferred work reported by the renderer
    fn insert_pending_analysis(
        &mut self,
        kind: AnalysisKind,
        payload: &str,
        origin_url: &str,
        depth: u32,
    ) -> StorageResult<i64>;

    /// Returns the oldest pending analysis record
    fn next_pending_analysis(&self) -> StorageResult<Option<PendingAnalysis>>;

    /// Deletes a pending analysis record once it has been converted
    fn delete_pending_analysis(&mut self, id: i64) -> StorageResult<()>;

    /// Counts pending analysis records
    fn count_pending_analysis(&self) -> StorageResult<u64>;

    // ===== Maintenance =====

    /// Removes every queue, response and pending row (runs are kept)
    fn clear_queues(&mut self) -> StorageResult<()>;
}
