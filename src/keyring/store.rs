// src/keyring/store.rs
//! Key persistence seam
//!
//! Stores are append-only: keys are inserted once and afterwards only their
//! revocation timestamp may change. Nothing is ever deleted.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{Key, KeyId};
use crate::error::{CoreError, Result};

pub trait KeyStore: Send + Sync {
    fn load_all(&self) -> Result<Vec<Key>>;

    /// Persist a new key. `note` is free-form ("bootstrap", "rotation", ...)
    fn insert(&self, key: &Key, note: &str) -> Result<()>;

    fn mark_revoked(&self, id: KeyId, revoked_at: DateTime<Utc>) -> Result<()>;
}

/// Process-local store; keys die with the process
#[derive(Default)]
pub struct MemoryKeyStore {
    keys: Mutex<Vec<Key>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn load_all(&self) -> Result<Vec<Key>> {
        Ok(self.keys.lock().clone())
    }

    fn insert(&self, key: &Key, _note: &str) -> Result<()> {
        let mut keys = self.keys.lock();
        if keys.iter().any(|k| k.id() == key.id()) {
            return Err(CoreError::KeyStore(format!("duplicate key id {}", key.id())));
        }
        keys.push(key.clone());
        Ok(())
    }

    fn mark_revoked(&self, id: KeyId, revoked_at: DateTime<Utc>) -> Result<()> {
        let mut keys = self.keys.lock();
        let slot = keys
            .iter_mut()
            .find(|k| k.id() == id)
            .ok_or_else(|| CoreError::KeyStore(format!("no stored key {id}")))?;
        if !slot.is_revoked() {
            *slot = slot.revoked(revoked_at);
        }
        Ok(())
    }
}
