// src/keyring/mod.rs
//! Versioned, purpose-scoped keys for the rotating envelope
//!
//! The key list is append-only: new keys are added, old keys are revoked,
//! nothing is edited or deleted. That is what keeps every envelope ever
//! written decryptable.

mod key;
mod ring;
mod store;
mod wrap;

pub use key::{Key, KeyId, KeyInfo};
pub use ring::KeyRing;
pub use store::{KeyStore, MemoryKeyStore};
pub use wrap::KeyWrapper;
