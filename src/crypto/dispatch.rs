// src/crypto/dispatch.rs
//! Application-facing field crypto: always write the rotating scheme, read either

use std::sync::Arc;

use tracing::debug;

use super::envelope::EnvelopeScheme;
use super::legacy::LegacyCipher;
use super::protector::PurposeProtector;
use crate::error::{CoreError, Result};
use crate::keyring::KeyRing;
use crate::records::SecretField;

pub struct FieldCrypto {
    ring: Arc<KeyRing>,
    legacy: Option<LegacyCipher>,
}

impl FieldCrypto {
    /// `legacy` is the read-only fallback for values not migrated yet; pass
    /// `None` once the legacy master key has been retired.
    pub fn new(ring: Arc<KeyRing>, legacy: Option<LegacyCipher>) -> Self {
        Self { ring, legacy }
    }

    pub fn ring(&self) -> &Arc<KeyRing> {
        &self.ring
    }

    pub fn protector(&self, field: SecretField) -> PurposeProtector {
        self.ring.protector(&field.purpose())
    }

    pub fn encrypt(&self, field: SecretField, plaintext: &str) -> Result<String> {
        self.protector(field).encrypt(plaintext)
    }

    pub fn decrypt(&self, field: SecretField, envelope: &str) -> Result<String> {
        match EnvelopeScheme::detect(envelope) {
            None => Err(CoreError::invalid("envelope must not be empty")),
            Some(EnvelopeScheme::Rotating) => self.protector(field).decrypt(envelope),
            Some(EnvelopeScheme::Legacy) => {
                let legacy = self.legacy.as_ref().ok_or_else(|| {
                    CoreError::crypto("legacy envelope found but the legacy cipher is retired")
                })?;
                debug!(field = %field, "decrypting not-yet-migrated legacy value");
                legacy.decrypt(envelope)
            }
        }
    }
}
