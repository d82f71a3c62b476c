// tests/common.rs
//! Shared test utilities: logging setup and fixtures
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use encrypted_field_vault::aliases::MasterKey;
use encrypted_field_vault::migration::CancelToken;
use encrypted_field_vault::{
    CoreError, CoreResult, FieldCrypto, KeyRing, LegacyCipher, RecordFields, RecordId,
    RecordStore, RotationPolicy, SecretField, SourceType,
};
use parking_lot::Mutex;
#[cfg(feature = "logging")]
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Call once at the start of any test that needs logs; respects RUST_LOG
pub fn setup() {
    #[cfg(feature = "logging")]
    tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();
}

/// Legacy iteration count for tests that do not exercise the KDF itself
pub const FAST_ITERATIONS: u32 = 1_000;

pub fn test_master_key() -> MasterKey {
    MasterKey::new([0x42; 32])
}

pub fn fast_legacy() -> LegacyCipher {
    LegacyCipher::with_iterations(test_master_key(), FAST_ITERATIONS)
}

pub fn memory_ring() -> Arc<KeyRing> {
    KeyRing::in_memory(RotationPolicy::default())
}

pub fn field_crypto(ring: &Arc<KeyRing>) -> FieldCrypto {
    FieldCrypto::new(Arc::clone(ring), Some(fast_legacy()))
}

pub fn fields(pairs: &[(SecretField, &str)]) -> RecordFields {
    pairs.iter().map(|(f, v)| (*f, v.to_string())).collect()
}

/// In-memory record store with failure and cancellation hooks
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<BTreeMap<RecordId, (SourceType, RecordFields)>>,
    failing: Mutex<BTreeSet<RecordId>>,
    update_calls: Mutex<Vec<RecordId>>,
    cancel_after_first_update: Mutex<Option<CancelToken>>,
    next_id: Mutex<i64>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, source_type: SourceType, values: RecordFields) -> RecordId {
        let mut next = self.next_id.lock();
        *next += 1;
        let id = RecordId(*next);
        self.records.lock().insert(id, (source_type, values));
        id
    }

    pub fn fields(&self, id: RecordId) -> RecordFields {
        self.records.lock()[&id].1.clone()
    }

    pub fn value(&self, id: RecordId, field: SecretField) -> String {
        self.fields(id)[&field].clone()
    }

    /// Every update of `id` fails with an I/O error
    pub fn fail_updates_for(&self, id: RecordId) {
        self.failing.lock().insert(id);
    }

    pub fn cancel_after_first_update(&self, token: CancelToken) {
        *self.cancel_after_first_update.lock() = Some(token);
    }

    pub fn update_calls(&self) -> Vec<RecordId> {
        self.update_calls.lock().clone()
    }
}

impl RecordStore for MemoryRecordStore {
    fn enumerate(
        &self,
        source_type: SourceType,
        fields: &[SecretField],
    ) -> CoreResult<Vec<(RecordId, RecordFields)>> {
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|(_, (t, _))| *t == source_type)
            .map(|(id, (_, values))| {
                let selected = values
                    .iter()
                    .filter(|(f, _)| fields.contains(f))
                    .map(|(f, v)| (*f, v.clone()))
                    .collect();
                (*id, selected)
            })
            .collect())
    }

    fn update_fields(&self, id: RecordId, values: &RecordFields) -> CoreResult<()> {
        self.update_calls.lock().push(id);
        if self.failing.lock().contains(&id) {
            return Err(CoreError::Io(std::io::Error::other(format!(
                "disk full while updating {id}"
            ))));
        }

        let mut records = self.records.lock();
        let (_, stored) = records
            .get_mut(&id)
            .ok_or(CoreError::Sql(rusqlite::Error::QueryReturnedNoRows))?;
        for (field, value) in values {
            stored.insert(*field, value.clone());
        }
        drop(records);

        if let Some(token) = self.cancel_after_first_update.lock().take() {
            token.cancel();
        }
        Ok(())
    }
}
