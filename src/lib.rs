// src/lib.rs
//! encrypted-field-vault: field-level encryption for stored connector secrets
//!
//! Features:
//! - Legacy master-key envelope (AES-256-CBC, PBKDF2-SHA256), decrypt fallback
//! - Rotating, purpose-scoped key ring with self-describing envelopes
//! - Key material wrapped with AES-256-GCM in SQLite, append-only
//! - One-shot, idempotent legacy → rotating migration

pub mod aliases;
pub mod config;
pub mod consts;
pub mod crypto;
pub mod db;
pub mod error;
pub mod keyring;
pub mod migration;
pub mod records;
pub mod rotation;

pub use config::load as load_config;
pub use crypto::{EnvelopeScheme, FieldCipher, FieldCrypto, LegacyCipher, PurposeProtector};
pub use error::{CoreError, Result as CoreResult};
pub use keyring::{Key, KeyId, KeyInfo, KeyRing, KeyStore, MemoryKeyStore};
pub use migration::{CancelToken, MigrationEngine, MigrationReport, RecordStore};
pub use records::{protect_fields, unprotect_fields, RecordFields, RecordId, SecretField, SourceType};
pub use rotation::RotationPolicy;
