// src/db/records_conn.rs
use std::fs;
use std::path::Path;

use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;

// Single table for every variant; `source_type` is the discriminator and
// columns a variant does not use stay NULL.
const RECORDS_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS data_sources (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        source_type TEXT NOT NULL
            CHECK (source_type IN ('Url', 'File', 'Ftp', 'Database', 'AzureBlob', 'S3')),
        password TEXT,
        api_key TEXT,
        bearer_token TEXT,
        private_key_path TEXT,
        connection_string TEXT,
        access_key TEXT,
        secret_key TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        modified_at TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_data_sources_type ON data_sources(source_type);

    CREATE TABLE IF NOT EXISTS field_migrations (
        name TEXT PRIMARY KEY,
        completed_at TEXT NOT NULL DEFAULT (datetime('now')),
        note TEXT
    );
"#;

/// Open (creating if needed) the records database
pub fn open_records_db<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    conn.execute_batch(RECORDS_SCHEMA)?;
    debug!(path = %path.display(), "records database ready");
    Ok(conn)
}

pub fn open_records_db_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(RECORDS_SCHEMA)?;
    Ok(conn)
}
