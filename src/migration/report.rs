// src/migration/report.rs
use serde::Serialize;

use crate::records::{RecordId, SourceType};

/// Outcome of one migration run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Rows enumerated across all variants
    pub records_scanned: usize,
    /// Fields re-encrypted and persisted
    pub fields_migrated: usize,
    /// Fields already carrying the rotating prefix
    pub fields_already_rotating: usize,
    /// Fields that failed legacy decryption and were left as stored
    pub fields_unreadable: usize,
    /// Fields that decrypted but could not be re-encrypted
    pub fields_failed: usize,
    pub records_updated: usize,
    pub failed_updates: Vec<FailedUpdate>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedUpdate {
    pub id: RecordId,
    pub source_type: SourceType,
    pub error: String,
}

impl MigrationReport {
    /// Ran to the end with every attempted write persisted
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failed_updates.is_empty() && self.fields_failed == 0
    }

    /// Complete, and no legacy-looking value was left behind. A wrong master
    /// key or iteration count shows up here as unreadable fields.
    pub fn can_mark_completed(&self) -> bool {
        self.is_complete() && self.fields_unreadable == 0
    }
}
