// src/migration/mod.rs
//! One-shot legacy → rotating migration of stored secret fields
//!
//! The engine only sees records through [`RecordStore`]; the SQLite
//! implementation lives in `db::records_ops`.

mod engine;
mod report;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use engine::MigrationEngine;
pub use report::{FailedUpdate, MigrationReport};

use crate::error::Result;
use crate::records::{RecordFields, RecordId, SecretField, SourceType};

/// Persistence collaborator consumed by the migration
pub trait RecordStore {
    /// Every record of `source_type` with only the requested fields.
    /// NULL columns are absent from the returned map.
    fn enumerate(
        &self,
        source_type: SourceType,
        fields: &[SecretField],
    ) -> Result<Vec<(RecordId, RecordFields)>>;

    /// Replace the given fields of one record in a single write
    fn update_fields(&self, id: RecordId, values: &RecordFields) -> Result<()>;
}

/// Cooperative stop signal, checked between records
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
