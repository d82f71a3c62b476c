// src/crypto/protector.rs
//! Purpose-bound encrypt/decrypt over the key ring
//!
//! Each ring key is expanded into an AES subkey and an HMAC subkey that are
//! specific to the purpose, so material shared across purposes never yields
//! the same derived key twice.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::envelope::{self, ParsedEnvelope};
use super::{aes_cbc, FieldCipher};
use crate::aliases::{Iv, KeyMaterial, SubKey};
use crate::consts::TAG_SIZE;
use crate::error::{CoreError, Result};
use crate::keyring::{Key, KeyRing};

type HmacSha256 = Hmac<Sha256>;

const ENC_SUBKEY_CONTEXT: &str = "encrypted-field-vault 2025-11 rotating envelope AES-256-CBC subkey";
const MAC_SUBKEY_CONTEXT: &str = "encrypted-field-vault 2025-11 rotating envelope HMAC-SHA256 subkey";

/// The public encrypt/decrypt contract for one purpose
#[derive(Clone)]
pub struct PurposeProtector {
    ring: Arc<KeyRing>,
    purpose: String,
}

impl std::fmt::Debug for PurposeProtector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PurposeProtector")
            .field("purpose", &self.purpose)
            .finish_non_exhaustive()
    }
}

impl PurposeProtector {
    pub(crate) fn new(ring: Arc<KeyRing>, purpose: String) -> Self {
        Self { ring, purpose }
    }

    pub fn purpose(&self) -> &str {
        &self.purpose
    }

    /// Encrypt under the purpose's current key, creating the first key if needed
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        if plaintext.is_empty() {
            return Err(CoreError::invalid("plaintext must not be empty"));
        }
        let key = self.ring.current_or_bootstrap(&self.purpose)?;
        seal(&key, plaintext.as_bytes())
    }

    /// Decrypt with whichever key the envelope names. Revoked and expired
    /// keys still decrypt.
    pub fn decrypt(&self, envelope: &str) -> Result<String> {
        if envelope.is_empty() {
            return Err(CoreError::invalid("envelope must not be empty"));
        }
        let parsed = ParsedEnvelope::parse(envelope)?;
        if parsed.header.purpose != self.purpose {
            return Err(CoreError::crypto(format!(
                "envelope was produced for purpose '{}', not '{}'",
                parsed.header.purpose, self.purpose
            )));
        }

        let key = self.ring.find_key(&self.purpose, parsed.header.key_id)?;
        let plaintext = open(&key, &parsed)?;
        String::from_utf8(plaintext)
            .map_err(|_| CoreError::crypto("decrypted payload is not valid UTF-8"))
    }
}

impl FieldCipher for PurposeProtector {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        PurposeProtector::encrypt(self, plaintext)
    }

    fn decrypt(&self, envelope: &str) -> Result<String> {
        PurposeProtector::decrypt(self, envelope)
    }
}

fn seal(key: &Key, plaintext: &[u8]) -> Result<String> {
    let enc_key = derive_subkey(ENC_SUBKEY_CONTEXT, key.material(), key.purpose());
    let mac_key = derive_subkey(MAC_SUBKEY_CONTEXT, key.material(), key.purpose());

    let iv = Iv::random();
    let ciphertext = aes_cbc::encrypt(&enc_key, &iv, plaintext)?;

    envelope::encode(key.purpose(), key.id(), &iv, &ciphertext, |signed| {
        let mut mac = new_mac(&mac_key)?;
        mac.update(signed);
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(&mac.finalize().into_bytes());
        Ok(tag)
    })
}

fn open(key: &Key, parsed: &ParsedEnvelope) -> Result<Vec<u8>> {
    let mac_key = derive_subkey(MAC_SUBKEY_CONTEXT, key.material(), key.purpose());
    let mut mac = new_mac(&mac_key)?;
    mac.update(parsed.signed_bytes());
    mac.verify_slice(parsed.tag())
        .map_err(|_| CoreError::crypto("envelope authentication failed"))?;

    let enc_key = derive_subkey(ENC_SUBKEY_CONTEXT, key.material(), key.purpose());
    aes_cbc::decrypt(&enc_key, &parsed.iv, parsed.ciphertext())
}

fn new_mac(key: &SubKey) -> Result<HmacSha256> {
    HmacSha256::new_from_slice(key.expose_secret())
        .map_err(|e| CoreError::crypto(format!("hmac init: {e}")))
}

fn derive_subkey(context: &str, material: &KeyMaterial, purpose: &str) -> SubKey {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(material.expose_secret());
    hasher.update(&(purpose.len() as u64).to_be_bytes());
    hasher.update(purpose.as_bytes());
    SubKey::new(*hasher.finalize().as_bytes())
}
