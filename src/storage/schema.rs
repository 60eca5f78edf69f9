//! Database schema definitions and migrations
//!
//! This module contains all SQL schema definitions for the Scoutline database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Requests discovered in scope; never deleted, only completed
CREATE TABLE IF NOT EXISTS queue_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    method TEXT NOT NULL,
    target_url TEXT NOT NULL,
    query_string TEXT,
    body_encoding TEXT,
    body_params TEXT,
    referer_url TEXT,
    status TEXT NOT NULL,
    depth INTEGER NOT NULL,
    dedup_key TEXT NOT NULL UNIQUE,
    discovered_run INTEGER NOT NULL REFERENCES runs(id),
    discovered_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_queue_items_status ON queue_items(status);
CREATE INDEX IF NOT EXISTS idx_queue_items_referer ON queue_items(referer_url);
CREATE INDEX IF NOT EXISTS idx_queue_items_target ON queue_items(method, target_url);

-- Response store
CREATE TABLE IF NOT EXISTS responses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    queue_item_id INTEGER REFERENCES queue_items(id),
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status_code INTEGER NOT NULL,
    headers TEXT NOT NULL,
    content_type TEXT,
    body BLOB NOT NULL,
    received_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_responses_url ON responses(url, method);

-- Responses waiting for spider or render analysis
CREATE TABLE IF NOT EXISTS pending_responses (
    response_id INTEGER NOT NULL REFERENCES responses(id),
    kind TEXT NOT NULL,
    depth INTEGER NOT NULL,
    status TEXT NOT NULL,
    PRIMARY KEY (response_id, kind)
);

CREATE INDEX IF NOT EXISTS idx_pending_responses_kind ON pending_responses(kind, status);

-- Work reported by the renderer, deleted once converted
CREATE TABLE IF NOT EXISTS pending_analysis (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    payload TEXT NOT NULL,
    origin_url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
