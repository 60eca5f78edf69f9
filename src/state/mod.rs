//! State module for tracking crawl work
//!
//! This module provides the status enums persisted alongside frontier rows.
//!
//! # Components
//!
//! - `QueueStatus`: Lifecycle of a not-yet-fetched request (pending, dispatched, complete)
//! - `PendingKind` / `PendingStatus`: Secondary work attached to a stored response
//! - `AnalysisKind`: Deferred renderer discoveries awaiting frontier processing

mod pending;
mod queue_status;

// Re-export main types
pub use pending::{AnalysisKind, PendingKind, PendingStatus};
pub use queue_status::QueueStatus;
