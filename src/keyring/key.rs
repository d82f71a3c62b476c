// src/keyring/key.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aliases::KeyMaterial;
use crate::error::CoreError;

/// Stable key identifier. UUIDv7, so ids also sort by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(Uuid);

impl KeyId {
    pub fn generate() -> Self {
        KeyId(Uuid::now_v7())
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        KeyId(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for KeyId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(KeyId)
            .map_err(|e| CoreError::invalid(format!("invalid key id '{s}': {e}")))
    }
}

/// A versioned ring key. Immutable once built; revocation produces a new value.
#[derive(Debug, Clone)]
pub struct Key {
    id: KeyId,
    purpose: String,
    material: KeyMaterial,
    created_at: DateTime<Utc>,
    activates_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl Key {
    /// Fresh random material with a new id
    pub(crate) fn generate(
        purpose: &str,
        created_at: DateTime<Utc>,
        activates_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Key {
            id: KeyId::generate(),
            purpose: purpose.to_owned(),
            material: KeyMaterial::random(),
            created_at,
            activates_at,
            expires_at,
            revoked_at: None,
        }
    }

    /// Rebuild a key loaded from a store
    pub fn from_parts(
        id: KeyId,
        purpose: String,
        material: KeyMaterial,
        created_at: DateTime<Utc>,
        activates_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        revoked_at: Option<DateTime<Utc>>,
    ) -> Self {
        Key {
            id,
            purpose,
            material,
            created_at,
            activates_at,
            expires_at,
            revoked_at,
        }
    }

    pub fn id(&self) -> KeyId {
        self.id
    }

    pub fn purpose(&self) -> &str {
        &self.purpose
    }

    /// Raw material. Only stores (to wrap it) and the protector should touch this.
    pub fn material(&self) -> &KeyMaterial {
        &self.material
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn activates_at(&self) -> DateTime<Utc> {
        self.activates_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Eligible to encrypt new data at `now`
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && self.activates_at <= now && now < self.expires_at
    }

    pub(crate) fn revoked(&self, at: DateTime<Utc>) -> Key {
        let mut key = self.clone();
        key.revoked_at = Some(at);
        key
    }

    pub fn info(&self, now: DateTime<Utc>, is_current: bool) -> KeyInfo {
        KeyInfo {
            id: self.id,
            purpose: self.purpose.clone(),
            created_at: self.created_at,
            activates_at: self.activates_at,
            expires_at: self.expires_at,
            revoked_at: self.revoked_at,
            active: self.is_active_at(now),
            current: is_current,
        }
    }
}

/// Key metadata without material, for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyInfo {
    pub id: KeyId,
    pub purpose: String,
    pub created_at: DateTime<Utc>,
    pub activates_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub current: bool,
}
