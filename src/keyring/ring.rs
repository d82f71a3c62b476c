// src/keyring/ring.rs
//! In-memory view of the persisted key list
//!
//! Readers (encrypt/decrypt) take a short read lock to clone an `Arc<Key>`.
//! Writers serialize on a separate mutex for the whole create/revoke step,
//! including the store round-trip, and only take the write lock for the final
//! push or swap. A rotation in progress therefore never stalls a reader for
//! longer than a lookup.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use super::store::{KeyStore, MemoryKeyStore};
use super::{Key, KeyId, KeyInfo};
use crate::crypto::PurposeProtector;
use crate::error::{CoreError, Result};
use crate::rotation::{select_current, RotationPolicy};

pub struct KeyRing {
    store: Arc<dyn KeyStore>,
    policy: RotationPolicy,
    keys: RwLock<Vec<Arc<Key>>>,
    writer: Mutex<()>,
}

impl std::fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRing")
            .field("keys", &self.keys.read().len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl KeyRing {
    /// Load every key the store holds
    pub fn open(store: Arc<dyn KeyStore>, policy: RotationPolicy) -> Result<Arc<Self>> {
        let keys = store.load_all()?.into_iter().map(Arc::new).collect::<Vec<_>>();
        debug!(count = keys.len(), "key ring loaded");
        Ok(Arc::new(KeyRing {
            store,
            policy,
            keys: RwLock::new(keys),
            writer: Mutex::new(()),
        }))
    }

    /// Ring over a fresh [`MemoryKeyStore`]
    pub fn in_memory(policy: RotationPolicy) -> Arc<Self> {
        Arc::new(KeyRing {
            store: Arc::new(MemoryKeyStore::new()),
            policy,
            keys: RwLock::new(Vec::new()),
            writer: Mutex::new(()),
        })
    }

    /// Re-read the store, picking up keys written by other processes
    pub fn refresh(&self) -> Result<()> {
        let _guard = self.writer.lock();
        let keys = self.store.load_all()?.into_iter().map(Arc::new).collect();
        *self.keys.write() = keys;
        Ok(())
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    pub fn protector(self: &Arc<Self>, purpose: &str) -> PurposeProtector {
        PurposeProtector::new(Arc::clone(self), purpose.to_owned())
    }

    pub fn current_key(&self, purpose: &str) -> Option<Arc<Key>> {
        self.current_key_at(purpose, Utc::now())
    }

    /// Latest-activated key that is neither revoked nor expired at `now`;
    /// ties go to the highest id
    pub fn current_key_at(&self, purpose: &str, now: DateTime<Utc>) -> Option<Arc<Key>> {
        select_current(&self.keys.read(), purpose, now)
    }

    /// Current key, creating one if the purpose has none eligible
    pub fn current_or_bootstrap(&self, purpose: &str) -> Result<Arc<Key>> {
        if let Some(key) = self.current_key(purpose) {
            return Ok(key);
        }

        let _guard = self.writer.lock();
        let now = Utc::now();
        // another caller may have bootstrapped while we waited
        if let Some(key) = self.current_key_at(purpose, now) {
            return Ok(key);
        }
        info!(purpose, "no usable key for purpose, bootstrapping one");
        self.insert_locked(purpose, now, now + self.policy.default_lifetime(), "bootstrap")
    }

    /// Explicitly create a key with the given validity window
    pub fn create_key(
        &self,
        purpose: &str,
        activates_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Arc<Key>> {
        let _guard = self.writer.lock();
        self.insert_locked(purpose, activates_at, expires_at, "rotation")
    }

    /// New key active immediately for the default lifetime
    pub fn rotate(&self, purpose: &str) -> Result<Arc<Key>> {
        let now = Utc::now();
        self.create_key(purpose, now, now + self.policy.default_lifetime())
    }

    pub fn ensure_fresh_key(&self, purpose: &str) -> Result<Option<Arc<Key>>> {
        self.ensure_fresh_key_at(purpose, Utc::now())
    }

    /// Provision a successor before the current key runs out; see
    /// [`RotationPolicy::successor_window`]
    pub fn ensure_fresh_key_at(
        &self,
        purpose: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Arc<Key>>> {
        let _guard = self.writer.lock();
        let candidates: Vec<Arc<Key>> = self
            .keys
            .read()
            .iter()
            .filter(|k| k.purpose() == purpose)
            .cloned()
            .collect();

        let Some((activates_at, expires_at)) =
            self.policy.successor_window(&candidates, purpose, now)
        else {
            return Ok(None);
        };
        self.insert_locked(purpose, activates_at, expires_at, "scheduled rotation")
            .map(Some)
    }

    /// Stop a key from being selected for encryption. It keeps decrypting.
    pub fn revoke(&self, id: KeyId) -> Result<Arc<Key>> {
        let _guard = self.writer.lock();
        let existing = self.lookup(|k| k.id() == id).ok_or(CoreError::KeyNotFound {
            purpose: "*".into(),
            key_id: id,
        })?;
        if existing.is_revoked() {
            return Ok(existing);
        }

        let now = Utc::now();
        self.store.mark_revoked(id, now)?;

        let revoked = Arc::new(existing.revoked(now));
        let mut keys = self.keys.write();
        if let Some(slot) = keys.iter_mut().find(|k| k.id() == id) {
            *slot = Arc::clone(&revoked);
        }
        info!(key_id = %id, purpose = revoked.purpose(), "key revoked");
        Ok(revoked)
    }

    /// Any key for the purpose, regardless of revocation or expiry
    pub fn find_key(&self, purpose: &str, id: KeyId) -> Result<Arc<Key>> {
        self.lookup(|k| k.id() == id && k.purpose() == purpose)
            .ok_or_else(|| CoreError::KeyNotFound {
                purpose: purpose.to_owned(),
                key_id: id,
            })
    }

    pub fn keys(&self, purpose: &str) -> Vec<KeyInfo> {
        self.describe(Some(purpose))
    }

    pub fn all_keys(&self) -> Vec<KeyInfo> {
        self.describe(None)
    }

    fn lookup(&self, pred: impl Fn(&Key) -> bool) -> Option<Arc<Key>> {
        self.keys.read().iter().find(|k| pred(k)).cloned()
    }

    fn describe(&self, purpose: Option<&str>) -> Vec<KeyInfo> {
        let now = Utc::now();
        let keys = self.keys.read();
        let mut out: Vec<KeyInfo> = keys
            .iter()
            .filter(|k| match purpose {
                Some(p) => k.purpose() == p,
                None => true,
            })
            .map(|k| {
                let current = select_current(&keys, k.purpose(), now)
                    .is_some_and(|c| c.id() == k.id());
                k.info(now, current)
            })
            .collect();
        out.sort_by(|a, b| {
            a.purpose
                .cmp(&b.purpose)
                .then(a.activates_at.cmp(&b.activates_at))
                .then(a.id.cmp(&b.id))
        });
        out
    }

    // caller holds `writer`
    fn insert_locked(
        &self,
        purpose: &str,
        activates_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        note: &str,
    ) -> Result<Arc<Key>> {
        if purpose.is_empty() {
            return Err(CoreError::invalid("purpose must not be empty"));
        }
        if activates_at > expires_at {
            return Err(CoreError::invalid(format!(
                "key activation {activates_at} is after its expiry {expires_at}"
            )));
        }

        let key = Key::generate(purpose, Utc::now(), activates_at, expires_at);
        self.store.insert(&key, note)?;

        let key = Arc::new(key);
        self.keys.write().push(Arc::clone(&key));
        info!(
            key_id = %key.id(),
            purpose,
            activates_at = %activates_at,
            expires_at = %expires_at,
            note,
            "key created"
        );
        Ok(key)
    }
}
