// src/db/key_ring_ops.rs
//! Key ring rows in SQLite
//!
//! Material is wrapped with the key-encryption key before it reaches the
//! database and unwrapped on load; the raw bytes never touch disk.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use super::key_ring_conn::open_key_ring_db;
use crate::aliases::WrappingKey;
use crate::config::Config;
use crate::error::{CoreError, Result};
use crate::keyring::{Key, KeyId, KeyStore, KeyWrapper};

pub struct SqliteKeyStore {
    conn: Mutex<Connection>,
    wrapper: KeyWrapper,
}

impl SqliteKeyStore {
    /// Wrap an already-initialised connection
    pub fn new(conn: Connection, kek: &WrappingKey) -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(conn),
            wrapper: KeyWrapper::new(kek)?,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P, kek: &WrappingKey) -> Result<Self> {
        Self::new(open_key_ring_db(path)?, kek)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::open(config.key_ring_db_path(), &config.key_encryption_key()?)
    }
}

impl KeyStore for SqliteKeyStore {
    fn load_all(&self) -> Result<Vec<Key>> {
        let conn = self.conn.lock();
        load_key_rows(&conn)?
            .into_iter()
            .map(|row| row.into_key(&self.wrapper))
            .collect()
    }

    fn insert(&self, key: &Key, note: &str) -> Result<()> {
        let blob = self.wrapper.wrap(key.id(), key.purpose(), key.material())?;
        let conn = self.conn.lock();
        insert_key_row(&conn, key, &blob, note)?;
        Ok(())
    }

    fn mark_revoked(&self, id: KeyId, revoked_at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock();
        if mark_key_revoked(&conn, id, revoked_at)? == 0 && !key_row_exists(&conn, id)? {
            return Err(CoreError::KeyStore(format!("no stored key {id}")));
        }
        Ok(())
    }
}

/// One `field_keys` row, material still wrapped
struct KeyRow {
    id: String,
    purpose: String,
    wrapped: Vec<u8>,
    created_at: DateTime<Utc>,
    activates_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl KeyRow {
    fn into_key(self, wrapper: &KeyWrapper) -> Result<Key> {
        let id: KeyId = self
            .id
            .parse()
            .map_err(|_| CoreError::KeyStore(format!("corrupt key id '{}'", self.id)))?;
        let material = wrapper.unwrap(id, &self.purpose, &self.wrapped)?;
        Ok(Key::from_parts(
            id,
            self.purpose,
            material,
            self.created_at,
            self.activates_at,
            self.expires_at,
            self.revoked_at,
        ))
    }
}

fn load_key_rows(conn: &Connection) -> rusqlite::Result<Vec<KeyRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, purpose, wrapped_material, created_at, activates_at, expires_at, revoked_at
         FROM field_keys ORDER BY purpose, activates_at, id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(KeyRow {
            id: row.get(0)?,
            purpose: row.get(1)?,
            wrapped: row.get(2)?,
            created_at: row.get(3)?,
            activates_at: row.get(4)?,
            expires_at: row.get(5)?,
            revoked_at: row.get(6)?,
        })
    })?;
    rows.collect()
}

fn insert_key_row(conn: &Connection, key: &Key, wrapped: &[u8], note: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO field_keys
            (id, purpose, wrapped_material, created_at, activates_at, expires_at, revoked_at, note)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            key.id().to_string(),
            key.purpose(),
            wrapped,
            key.created_at(),
            key.activates_at(),
            key.expires_at(),
            key.revoked_at(),
            note
        ],
    )?;
    Ok(())
}

/// Returns the number of rows changed; 0 if unknown or already revoked
fn mark_key_revoked(conn: &Connection, id: KeyId, at: DateTime<Utc>) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE field_keys SET revoked_at = ?2 WHERE id = ?1 AND revoked_at IS NULL",
        params![id.to_string(), at],
    )
}

fn key_row_exists(conn: &Connection, id: KeyId) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM field_keys WHERE id = ?1",
        [id.to_string()],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}
