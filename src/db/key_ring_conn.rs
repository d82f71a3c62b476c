// src/db/key_ring_conn.rs
use std::fs;
use std::path::Path;

use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;

const KEY_RING_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS field_keys (
        id TEXT PRIMARY KEY,
        purpose TEXT NOT NULL,
        wrapped_material BLOB NOT NULL,
        created_at TEXT NOT NULL,
        activates_at TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        revoked_at TEXT,
        note TEXT,
        CHECK (activates_at <= expires_at)
    );

    CREATE INDEX IF NOT EXISTS idx_field_keys_purpose ON field_keys(purpose);

    -- Keys are never deleted: old envelopes must stay decryptable
    CREATE TRIGGER IF NOT EXISTS field_keys_no_delete
    BEFORE DELETE ON field_keys
    BEGIN
        SELECT RAISE(ABORT, 'field keys are append-only');
    END;

    -- Only revoked_at may change after insert
    CREATE TRIGGER IF NOT EXISTS field_keys_immutable
    BEFORE UPDATE OF id, purpose, wrapped_material, created_at, activates_at, expires_at
    ON field_keys
    BEGIN
        SELECT RAISE(ABORT, 'field key material and validity are immutable');
    END;

    CREATE TRIGGER IF NOT EXISTS field_keys_revoke_once
    BEFORE UPDATE OF revoked_at ON field_keys
    WHEN OLD.revoked_at IS NOT NULL
    BEGIN
        SELECT RAISE(ABORT, 'field key already revoked');
    END;
"#;

/// Open (creating if needed) the key ring database
pub fn open_key_ring_db<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    init_schema(&conn)?;
    debug!(path = %path.display(), "key ring database ready");
    Ok(conn)
}

pub fn open_key_ring_db_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(KEY_RING_SCHEMA)?;
    Ok(())
}
