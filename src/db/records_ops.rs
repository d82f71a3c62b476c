// src/db/records_ops.rs
//! Data-source rows and the migration run-once guard
//!
//! Secret columns are addressed through [`SecretField::column`], a closed set
//! of static names, so building column lists with `format!` never splices
//! caller input into SQL.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};

use super::records_conn::{open_records_db, open_records_db_in_memory};
use crate::config::Config;
use crate::error::{CoreError, Result};
use crate::migration::RecordStore;
use crate::records::{check_fields, DataSource, RecordFields, RecordId, SecretField, SourceType};

/// Insert payload; `secrets` must already be protected
#[derive(Debug, Clone)]
pub struct NewDataSource {
    pub name: String,
    pub description: Option<String>,
    pub source_type: SourceType,
    pub secrets: RecordFields,
}

pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(open_records_db(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(open_records_db_in_memory()?))
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::open(config.records_db_path())
    }

    pub fn insert(&self, source: &NewDataSource) -> Result<RecordId> {
        check_fields(source.source_type, &source.secrets)?;

        let source_type = source.source_type.as_str();
        let mut columns = vec!["name", "description", "source_type"];
        let mut values: Vec<&dyn ToSql> = vec![&source.name, &source.description, &source_type];
        for (field, value) in &source.secrets {
            columns.push(field.column());
            values.push(value);
        }
        let placeholders = (1..=values.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO data_sources ({}) VALUES ({placeholders})",
            columns.join(", ")
        );

        let conn = self.conn.lock();
        conn.execute(&sql, values.as_slice())?;
        Ok(RecordId(conn.last_insert_rowid()))
    }

    pub fn get(&self, id: RecordId) -> Result<Option<DataSource>> {
        let sql = format!(
            "SELECT name, description, source_type, {} FROM data_sources WHERE id = ?1",
            secret_columns(&SecretField::ALL)
        );
        let conn = self.conn.lock();
        let row = conn
            .query_row(&sql, [id.0], |row| {
                let name: String = row.get(0)?;
                let description: Option<String> = row.get(1)?;
                let source_type: String = row.get(2)?;
                let secrets = read_fields(row, 3, &SecretField::ALL)?;
                Ok((name, description, source_type, secrets))
            })
            .optional()?;

        row.map(|(name, description, source_type, secrets)| -> Result<DataSource> {
            Ok(DataSource {
                id,
                name,
                description,
                source_type: source_type.parse()?,
                secrets,
            })
        })
        .transpose()
    }

    pub fn count(&self, source_type: SourceType) -> Result<u64> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM data_sources WHERE source_type = ?1",
            [source_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    pub fn migration_completed(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM field_migrations WHERE name = ?1",
                [name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Record a finished migration. Re-marking refreshes the timestamp.
    pub fn mark_migration_completed(&self, name: &str, note: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO field_migrations (name, completed_at, note)
             VALUES (?1, datetime('now'), ?2)
             ON CONFLICT(name) DO UPDATE SET completed_at = excluded.completed_at, note = excluded.note",
            params![name, note],
        )?;
        Ok(())
    }
}

impl RecordStore for SqliteRecordStore {
    fn enumerate(
        &self,
        source_type: SourceType,
        fields: &[SecretField],
    ) -> Result<Vec<(RecordId, RecordFields)>> {
        let sql = if fields.is_empty() {
            "SELECT id FROM data_sources WHERE source_type = ?1 ORDER BY id".to_owned()
        } else {
            format!(
                "SELECT id, {} FROM data_sources WHERE source_type = ?1 ORDER BY id",
                secret_columns(fields)
            )
        };

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([source_type.as_str()], |row| {
            Ok((RecordId(row.get(0)?), read_fields(row, 1, fields)?))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn update_fields(&self, id: RecordId, values: &RecordFields) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }

        let assignments = values
            .keys()
            .enumerate()
            .map(|(i, field)| format!("{} = ?{}", field.column(), i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let id_param = values.len() + 1;
        let sql = format!(
            "UPDATE data_sources SET {assignments}, modified_at = datetime('now') WHERE id = ?{id_param}"
        );

        let mut params: Vec<&dyn ToSql> = values.values().map(|v| v as &dyn ToSql).collect();
        params.push(&id.0);

        let conn = self.conn.lock();
        let changed = conn.execute(&sql, params.as_slice())?;
        if changed == 0 {
            return Err(CoreError::Sql(rusqlite::Error::QueryReturnedNoRows));
        }
        Ok(())
    }
}

fn secret_columns(fields: &[SecretField]) -> String {
    fields
        .iter()
        .map(|f| f.column())
        .collect::<Vec<_>>()
        .join(", ")
}

/// NULL columns are left out of the map
fn read_fields(
    row: &rusqlite::Row<'_>,
    offset: usize,
    fields: &[SecretField],
) -> rusqlite::Result<RecordFields> {
    let mut out = RecordFields::new();
    for (i, field) in fields.iter().enumerate() {
        if let Some(value) = row.get::<_, Option<String>>(offset + i)? {
            out.insert(*field, value);
        }
    }
    Ok(out)
}
