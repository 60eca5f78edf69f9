//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{AnalysisKind, PendingKind, PendingStatus, QueueStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    NewQueueItem, NewResponse, PendingAnalysis, PendingResponse, QueueItem, RunRecord, RunStatus,
    StoredResponse,
};
use crate::ScoutError;
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;

const QUEUE_ITEM_COLUMNS: &str = "id, method, target_url, query_string, body_encoding, \
     body_params, referer_url, status, depth";

const RESPONSE_COLUMNS: &str =
    "id, queue_item_id, method, url, status_code, headers, content_type, body, received_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(ScoutError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, ScoutError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (tests and dry runs)
    pub fn new_in_memory() -> Result<Self, ScoutError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Running),
    })
}

fn queue_item_from_row(row: &Row<'_>) -> rusqlite::Result<QueueItem> {
    Ok(QueueItem {
        id: row.get(0)?,
        method: row.get(1)?,
        target_url: row.get(2)?,
        query_string: row.get(3)?,
        body_encoding: row.get(4)?,
        body_params: row.get(5)?,
        referer_url: row.get(6)?,
        // An unreadable status is treated as finished so the item is never refetched
        status: QueueStatus::from_db_string(&row.get::<_, String>(7)?)
            .unwrap_or(QueueStatus::Complete),
        depth: row.get(8)?,
    })
}

fn response_from_row(row: &Row<'_>) -> rusqlite::Result<StoredResponse> {
    let headers_json: String = row.get(5)?;
    let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

    Ok(StoredResponse {
        id: row.get(0)?,
        queue_item_id: row.get(1)?,
        method: row.get(2)?,
        url: row.get(3)?,
        status_code: row.get(4)?,
        headers,
        content_type: row.get(6)?,
        body: row.get(7)?,
        received_at: row.get(8)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .map_err(|_| StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), run_id],
        )?;
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![RunStatus::Completed.to_db_string(), now, run_id],
        )?;
        Ok(())
    }

    // ===== Queue Items =====

    fn insert_queue_item(
        &mut self,
        item: &NewQueueItem,
        run_id: i64,
    ) -> StorageResult<Option<i64>> {
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO queue_items
             (method, target_url, query_string, body_encoding, body_params, referer_url,
              status, depth, dedup_key, discovered_run, discovered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                item.method,
                item.target_url,
                item.query_string,
                item.body_encoding,
                item.body_params,
                item.referer_url,
                QueueStatus::Pending.to_db_string(),
                item.depth,
                item.dedup_key,
                run_id,
                now,
            ],
        )?;

        if inserted == 0 {
            Ok(None)
        } else {
            Ok(Some(self.conn.last_insert_rowid()))
        }
    }

    fn get_queue_item(&self, id: i64) -> StorageResult<QueueItem> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM queue_items WHERE id = ?1", QUEUE_ITEM_COLUMNS),
                params![id],
                queue_item_from_row,
            )
            .optional()?
            .ok_or(StorageError::QueueItemNotFound(id))
    }

    fn find_queue_item(&self, dedup_key: &str) -> StorageResult<Option<QueueItem>> {
        let item = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM queue_items WHERE dedup_key = ?1",
                    QUEUE_ITEM_COLUMNS
                ),
                params![dedup_key],
                queue_item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    fn next_pending_queue_item(&self) -> StorageResult<Option<QueueItem>> {
        let item = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM queue_items WHERE status = ?1 ORDER BY depth, id LIMIT 1",
                    QUEUE_ITEM_COLUMNS
                ),
                params![QueueStatus::Pending.to_db_string()],
                queue_item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    fn update_queue_status(&mut self, id: i64, status: QueueStatus) -> StorageResult<()> {
        let current = self.get_queue_item(id)?.status;
        if !current.can_transition_to(status) {
            return Err(StorageError::InvalidTransition {
                from: current,
                to: status,
            });
        }

        self.conn.execute(
            "UPDATE queue_items SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), id],
        )?;
        Ok(())
    }

    fn reset_dispatched_items(&mut self) -> StorageResult<usize> {
        let reset = self.conn.execute(
            "UPDATE queue_items SET status = ?1 WHERE status = ?2",
            params![
                QueueStatus::Pending.to_db_string(),
                QueueStatus::Dispatched.to_db_string()
            ],
        )?;
        Ok(reset)
    }

    fn count_queue_items(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM queue_items", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_queue_by_status(&self, status: QueueStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM queue_items WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_children(&self, referer_url: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM queue_items WHERE referer_url = ?1",
            params![referer_url],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_query_variants(&self, method: &str, target_url: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT COALESCE(query_string, '')) FROM queue_items
             WHERE method = ?1 AND target_url = ?2",
            params![method, target_url],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Response Store =====

    fn insert_response(&mut self, response: &NewResponse) -> StorageResult<i64> {
        let headers = serde_json::to_string(&response.headers)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT INTO responses
             (queue_item_id, method, url, status_code, headers, content_type, body, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                response.queue_item_id,
                response.method,
                response.url,
                response.status_code,
                headers,
                response.content_type,
                response.body,
                now,
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn read_response_by_id(&self, id: i64) -> StorageResult<Option<StoredResponse>> {
        let response = self
            .conn
            .query_row(
                &format!("SELECT {} FROM responses WHERE id = ?1", RESPONSE_COLUMNS),
                params![id],
                response_from_row,
            )
            .optional()?;
        Ok(response)
    }

    fn read_responses_by_url(&self, url: &str) -> StorageResult<Vec<StoredResponse>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM responses WHERE url = ?1 ORDER BY id",
            RESPONSE_COLUMNS
        ))?;

        let responses = stmt
            .query_map(params![url], response_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(responses)
    }

    fn find_found_response(
        &self,
        method: &str,
        url: &str,
    ) -> StorageResult<Option<StoredResponse>> {
        let response = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM responses
                     WHERE url = ?1 AND method = ?2
                       AND status_code BETWEEN 200 AND 299 AND length(body) > 0
                     ORDER BY id LIMIT 1",
                    RESPONSE_COLUMNS
                ),
                params![url, method],
                response_from_row,
            )
            .optional()?;
        Ok(response)
    }

    fn count_responses(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM responses", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Pending Responses =====

    fn ensure_pending_response(
        &mut self,
        response_id: i64,
        kind: PendingKind,
        depth: u32,
    ) -> StorageResult<bool> {
        let existing: Option<u32> = self
            .conn
            .query_row(
                "SELECT depth FROM pending_responses WHERE response_id = ?1 AND kind = ?2",
                params![response_id, kind.to_db_string()],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            None => {
                self.conn.execute(
                    "INSERT INTO pending_responses (response_id, kind, depth, status)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        response_id,
                        kind.to_db_string(),
                        depth,
                        PendingStatus::Pending.to_db_string()
                    ],
                )?;
                Ok(true)
            }
            Some(known) if depth < known => {
                self.conn.execute(
                    "UPDATE pending_responses SET depth = ?1, status = ?2
                     WHERE response_id = ?3 AND kind = ?4",
                    params![
                        depth,
                        PendingStatus::Pending.to_db_string(),
                        response_id,
                        kind.to_db_string()
                    ],
                )?;
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }

    fn next_pending_response(
        &self,
        kind: PendingKind,
        claimed: &HashSet<i64>,
    ) -> StorageResult<Option<PendingResponse>> {
        let mut stmt = self.conn.prepare(
            "SELECT response_id, depth FROM pending_responses
             WHERE kind = ?1 AND status = ?2
             ORDER BY depth, response_id",
        )?;

        let rows = stmt.query_map(
            params![kind.to_db_string(), PendingStatus::Pending.to_db_string()],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, u32>(1)?)),
        )?;

        for row in rows {
            let (response_id, depth) = row?;
            if claimed.contains(&response_id) {
                continue;
            }
            return Ok(Some(PendingResponse {
                response_id,
                kind,
                depth,
                status: PendingStatus::Pending,
            }));
        }

        Ok(None)
    }

    fn complete_pending_response(
        &mut self,
        response_id: i64,
        kind: PendingKind,
        claimed_depth: u32,
    ) -> StorageResult<bool> {
        let updated = self.conn.execute(
            "UPDATE pending_responses SET status = ?1
             WHERE response_id = ?2 AND kind = ?3 AND depth = ?4",
            params![
                PendingStatus::Complete.to_db_string(),
                response_id,
                kind.to_db_string(),
                claimed_depth
            ],
        )?;
        Ok(updated > 0)
    }

    fn count_pending_responses(
        &self,
        kind: PendingKind,
        status: PendingStatus,
    ) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pending_responses WHERE kind = ?1 AND status = ?2",
            params![kind.to_db_string(), status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Pending Analysis =====

    fn insert_pending_analysis(
        &mut self,
        kind: AnalysisKind,
        payload: &str,
        origin_url: &str,
        depth: u32,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO pending_analysis (kind, payload, origin_url, depth, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![kind.to_db_string(), payload, origin_url, depth, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn next_pending_analysis(&self) -> StorageResult<Option<PendingAnalysis>> {
        let record: Option<(i64, String, String, String, u32)> = self
            .conn
            .query_row(
                "SELECT id, kind, payload, origin_url, depth FROM pending_analysis
                 ORDER BY id LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()?;

        match record {
            Some((id, kind, payload, origin_url, depth)) => {
                let kind = AnalysisKind::from_db_string(&kind).ok_or_else(|| {
                    StorageError::Database(format!(
                        "Unknown analysis kind '{}' for record {}",
                        kind, id
                    ))
                })?;
                Ok(Some(PendingAnalysis {
                    id,
                    kind,
                    payload,
                    origin_url,
                    depth,
                }))
            }
            None => Ok(None),
        }
    }

    fn delete_pending_analysis(&mut self, id: i64) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM pending_analysis WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn count_pending_analysis(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pending_analysis", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Maintenance =====

    fn clear_queues(&mut self) -> StorageResult<()> {
        self.conn.execute_batch(
            "
            DELETE FROM pending_analysis;
            DELETE FROM pending_responses;
            DELETE FROM responses;
            DELETE FROM queue_items;
        ",
        )?;
        Ok(())
    }
}
