// src/crypto/mod.rs
//! Field-level cryptography. No I/O, no database.
//!
//! Two envelope schemes live here: the legacy master-key cipher and the
//! key-ring protector that replaces it. Both expose the same string-in,
//! string-out contract through [`FieldCipher`].
mod aes_cbc;
mod dispatch;
mod envelope;
mod legacy;
mod protector;

pub use dispatch::FieldCrypto;
pub use envelope::{read_header, EnvelopeHeader, EnvelopeScheme};
pub use legacy::{generate_salt, LegacyCipher};
pub use protector::PurposeProtector;

use crate::error::Result;

/// Encrypt/decrypt contract consumed by everything outside the core
pub trait FieldCipher {
    /// Fails with `InvalidArgument` on empty input
    fn encrypt(&self, plaintext: &str) -> Result<String>;

    /// Fails with `InvalidArgument` on empty or malformed input, `Crypto` on
    /// cipher-level failure, `KeyNotFound` if the named key is gone
    fn decrypt(&self, envelope: &str) -> Result<String>;
}
