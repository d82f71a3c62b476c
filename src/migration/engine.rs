// src/migration/engine.rs
//! Migration driver
//!
//! Three phases:
//! 1. collect every record with a non-empty secret, across all variants
//! 2. build one protector per purpose, so each purpose bootstraps its first
//!    key once for the whole run
//! 3. per record: legacy-decrypt each field, re-encrypt, write the changed
//!    fields in one update
//!
//! A field that does not legacy-decrypt is left alone. That is what makes a
//! second run a no-op.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::{CancelToken, FailedUpdate, MigrationReport, RecordStore};
use crate::crypto::{EnvelopeScheme, LegacyCipher, PurposeProtector};
use crate::error::Result;
use crate::keyring::KeyRing;
use crate::records::{RecordFields, RecordId, SecretField, SourceType};

struct PendingRecord {
    id: RecordId,
    source_type: SourceType,
    values: RecordFields,
}

pub struct MigrationEngine<'a> {
    store: &'a dyn RecordStore,
    legacy: LegacyCipher,
    ring: Arc<KeyRing>,
    cancel: CancelToken,
}

impl<'a> MigrationEngine<'a> {
    pub fn new(store: &'a dyn RecordStore, legacy: LegacyCipher, ring: Arc<KeyRing>) -> Self {
        Self {
            store,
            legacy,
            ring,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Errors only if records cannot be enumerated. Per-field and per-record
    /// failures end up in the report.
    pub fn run(&self) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();

        let pending = self.collect(&mut report)?;
        if pending.is_empty() {
            info!(
                records_scanned = report.records_scanned,
                "no legacy secrets to migrate"
            );
            return Ok(report);
        }

        let protectors = self.protectors(&pending);

        for record in &pending {
            if self.cancel.is_cancelled() {
                warn!(next_record = %record.id, "migration cancelled");
                report.cancelled = true;
                break;
            }
            self.migrate_record(record, &protectors, &mut report);
        }

        info!(
            records_scanned = report.records_scanned,
            records_updated = report.records_updated,
            fields_migrated = report.fields_migrated,
            fields_already_rotating = report.fields_already_rotating,
            fields_unreadable = report.fields_unreadable,
            fields_failed = report.fields_failed,
            failed_updates = report.failed_updates.len(),
            cancelled = report.cancelled,
            "field migration finished"
        );
        Ok(report)
    }

    fn collect(&self, report: &mut MigrationReport) -> Result<Vec<PendingRecord>> {
        let mut pending = Vec::new();
        for source_type in SourceType::ALL {
            let fields = source_type.sensitive_fields();
            if fields.is_empty() {
                continue;
            }

            let rows = self.store.enumerate(source_type, fields)?;
            report.records_scanned += rows.len();
            debug!(%source_type, records = rows.len(), "collected records");

            for (id, mut values) in rows {
                values.retain(|_, v| !v.is_empty());
                if !values.is_empty() {
                    pending.push(PendingRecord {
                        id,
                        source_type,
                        values,
                    });
                }
            }
        }
        Ok(pending)
    }

    fn protectors(&self, pending: &[PendingRecord]) -> BTreeMap<SecretField, PurposeProtector> {
        let mut protectors = BTreeMap::new();
        for field in pending.iter().flat_map(|r| r.values.keys()) {
            protectors
                .entry(*field)
                .or_insert_with(|| self.ring.protector(&field.purpose()));
        }
        protectors
    }

    fn migrate_record(
        &self,
        record: &PendingRecord,
        protectors: &BTreeMap<SecretField, PurposeProtector>,
        report: &mut MigrationReport,
    ) {
        let mut updates = RecordFields::new();

        for (&field, value) in &record.values {
            // rotating envelopes would fail legacy decryption anyway; skip the KDF
            if EnvelopeScheme::detect(value) == Some(EnvelopeScheme::Rotating) {
                report.fields_already_rotating += 1;
                continue;
            }

            let plaintext = match self.legacy.decrypt(value) {
                Ok(p) => Zeroizing::new(p),
                Err(e) => {
                    debug!(record = %record.id, %field, error = %e, "not a legacy envelope, skipping");
                    report.fields_unreadable += 1;
                    continue;
                }
            };

            let Some(protector) = protectors.get(&field) else {
                report.fields_failed += 1;
                continue;
            };
            match protector.encrypt(&plaintext) {
                Ok(envelope) => {
                    updates.insert(field, envelope);
                }
                Err(e) => {
                    warn!(record = %record.id, %field, error = %e, "re-encryption failed, field left as is");
                    report.fields_failed += 1;
                }
            }
        }

        if updates.is_empty() {
            return;
        }

        match self.store.update_fields(record.id, &updates) {
            Ok(()) => {
                report.records_updated += 1;
                report.fields_migrated += updates.len();
            }
            Err(e) => {
                warn!(
                    record = %record.id,
                    source_type = %record.source_type,
                    error = %e,
                    "record update failed, continuing"
                );
                report.failed_updates.push(FailedUpdate {
                    id: record.id,
                    source_type: record.source_type,
                    error: e.to_string(),
                });
            }
        }
    }
}
