//! Storage module for persisting crawl state
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - The queue of not-yet-fetched requests
//! - The response store (fetched responses, read back by id or URL)
//! - Spider/render pending-response rows and pending analysis work
//! - Run tracking and resumption support

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::{AnalysisKind, PendingKind, PendingStatus, QueueStatus};
use crate::ScoutError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(ScoutError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, ScoutError> {
    SqliteStorage::new(path)
}

/// A not-yet-fetched request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub id: i64,
    pub method: String,
    /// URL without its query string
    pub target_url: String,
    pub query_string: Option<String>,
    /// Content type of the body (`application/x-www-form-urlencoded`, `multipart/form-data`)
    pub body_encoding: Option<String>,
    /// Body parameters, form-urlencoded
    pub body_params: Option<String>,
    pub referer_url: Option<String>,
    pub status: QueueStatus,
    pub depth: u32,
}

impl QueueItem {
    /// Returns the full request URL (target plus query string)
    pub fn full_url(&self) -> String {
        match &self.query_string {
            Some(query) if !query.is_empty() => format!("{}?{}", self.target_url, query),
            _ => self.target_url.clone(),
        }
    }
}

/// A queue item about to be inserted
#[derive(Debug, Clone)]
pub struct NewQueueItem {
    pub method: String,
    pub target_url: String,
    pub query_string: Option<String>,
    pub body_encoding: Option<String>,
    pub body_params: Option<String>,
    pub referer_url: Option<String>,
    pub depth: u32,
    /// Method plus normalized full URL; unique across the queue
    pub dedup_key: String,
}

/// A fetched response in the response store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub id: i64,
    /// Queue item the response answered, if it came from the queue
    pub queue_item_id: Option<i64>,
    pub method: String,
    pub url: String,
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub received_at: String,
}

impl StoredResponse {
    /// Returns the first header with the given name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns true for a 2xx response with a body
    pub fn is_found(&self) -> bool {
        (200..300).contains(&self.status_code) && !self.body.is_empty()
    }

    /// Returns true if the content type names an HTML document
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml")
            })
            .unwrap_or(false)
    }

    /// Returns true if the content type names a script
    pub fn is_script(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("javascript"))
            .unwrap_or(false)
    }
}

/// A response about to be stored
#[derive(Debug, Clone)]
pub struct NewResponse {
    pub queue_item_id: Option<i64>,
    pub method: String,
    pub url: String,
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// A response waiting for spider or render analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingResponse {
    pub response_id: i64,
    pub kind: PendingKind,
    pub depth: u32,
    pub status: PendingStatus,
}

/// Deferred work reported by the renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAnalysis {
    pub id: i64,
    pub kind: AnalysisKind,
    /// A URL, an HTML fragment, or a response id, depending on `kind`
    pub payload: String,
    pub origin_url: String,
    pub depth: u32,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
