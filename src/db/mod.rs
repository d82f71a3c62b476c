// src/db/mod.rs
//! SQLite persistence
//!
//! Two databases, mirroring the split between secrets and data:
//! - key ring (`field_keys`), wrapped material only
//! - records (`data_sources`), secret columns hold envelopes only

pub mod key_ring_conn;
pub mod key_ring_ops;
pub mod records_conn;
pub mod records_ops;

pub use key_ring_conn::{open_key_ring_db, open_key_ring_db_in_memory};
pub use key_ring_ops::SqliteKeyStore;
pub use records_conn::{open_records_db, open_records_db_in_memory};
pub use records_ops::{NewDataSource, SqliteRecordStore};
