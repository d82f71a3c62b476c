// src/crypto/legacy.rs
//! Legacy master-key envelope
//!
//! `base64(salt[16] || iv[16] || AES-256-CBC/PKCS7(plaintext))`, where the
//! AES key is PBKDF2-SHA256(master_key, salt, 600 000). Every value written
//! before the key ring existed uses this format. New data is never written
//! with it outside of tests; it survives as a decrypt-only fallback and as
//! the source side of the migration.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use super::{aes_cbc, FieldCipher};
use crate::aliases::{Iv, MasterKey, Salt, SubKey};
use crate::config::Config;
use crate::consts::{IV_SIZE, KEY_SIZE, LEGACY_KDF_ITERATIONS, LEGACY_MIN_ENVELOPE_LEN, SALT_SIZE};
use crate::error::{CoreError, Result};

#[derive(Clone)]
pub struct LegacyCipher {
    master_key: MasterKey,
    iterations: u32,
}

impl std::fmt::Debug for LegacyCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyCipher")
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

impl LegacyCipher {
    pub fn new(master_key: MasterKey) -> Self {
        Self::with_iterations(master_key, LEGACY_KDF_ITERATIONS)
    }

    /// Non-standard iteration count. Envelopes are only readable by a cipher
    /// built with the same count.
    pub fn with_iterations(master_key: MasterKey, iterations: u32) -> Self {
        Self {
            master_key,
            iterations: iterations.max(1),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::with_iterations(
            config.legacy_master_key()?,
            config.legacy_kdf_iterations(),
        ))
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Encrypt with a fresh random salt and IV
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        if plaintext.is_empty() {
            return Err(CoreError::invalid("plaintext must not be empty"));
        }
        let salt = Salt::random();
        self.seal(plaintext, &salt)
    }

    /// Encrypt with a caller-supplied salt (the IV is still random).
    ///
    /// Only the first 16 bytes of `salt` are used, since that is all the
    /// envelope has room for.
    pub fn encrypt_with_salt(&self, plaintext: &str, salt: &[u8]) -> Result<String> {
        if plaintext.is_empty() {
            return Err(CoreError::invalid("plaintext must not be empty"));
        }
        if salt.len() < SALT_SIZE {
            return Err(CoreError::invalid(format!(
                "salt must be at least {SALT_SIZE} bytes, got {}",
                salt.len()
            )));
        }
        let salt = Salt::from_slice(&salt[..SALT_SIZE])
            .ok_or_else(|| CoreError::invalid("salt length"))?;
        self.seal(plaintext, &salt)
    }

    pub fn decrypt(&self, envelope: &str) -> Result<String> {
        if envelope.is_empty() {
            return Err(CoreError::invalid("envelope must not be empty"));
        }

        // stored values may carry line breaks or padding spaces
        let compact: String = envelope
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let raw = STANDARD
            .decode(&compact)
            .map_err(|e| CoreError::crypto(format!("envelope is not valid base64: {e}")))?;

        if raw.len() < LEGACY_MIN_ENVELOPE_LEN {
            return Err(CoreError::invalid(format!(
                "envelope decodes to {} bytes, need at least {LEGACY_MIN_ENVELOPE_LEN}",
                raw.len()
            )));
        }

        let (salt, rest) = raw.split_at(SALT_SIZE);
        let (iv, ciphertext) = rest.split_at(IV_SIZE);
        let salt = Salt::from_slice(salt).ok_or_else(|| CoreError::invalid("salt length"))?;
        let iv = Iv::from_slice(iv).ok_or_else(|| CoreError::invalid("iv length"))?;

        let key = self.derive_key(&salt);
        let plaintext = aes_cbc::decrypt(&key, &iv, ciphertext)?;

        String::from_utf8(plaintext).map_err(|e| {
            let mut bytes = e.into_bytes();
            bytes.zeroize();
            CoreError::crypto("decrypted payload is not valid UTF-8")
        })
    }

    fn seal(&self, plaintext: &str, salt: &Salt) -> Result<String> {
        let key = self.derive_key(salt);
        let iv = Iv::random();
        let ciphertext = aes_cbc::encrypt(&key, &iv, plaintext.as_bytes())?;

        let mut out = Vec::with_capacity(SALT_SIZE + IV_SIZE + ciphertext.len());
        out.extend_from_slice(salt.expose_secret());
        out.extend_from_slice(iv.expose_secret());
        out.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(out))
    }

    fn derive_key(&self, salt: &Salt) -> SubKey {
        let mut derived = [0u8; KEY_SIZE];
        pbkdf2::pbkdf2_hmac::<Sha256>(
            self.master_key.expose_secret(),
            salt.expose_secret(),
            self.iterations,
            &mut derived,
        );
        let key = SubKey::new(derived);
        derived.zeroize();
        key
    }
}

impl FieldCipher for LegacyCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        LegacyCipher::encrypt(self, plaintext)
    }

    fn decrypt(&self, envelope: &str) -> Result<String> {
        LegacyCipher::decrypt(self, envelope)
    }
}

/// Random bytes for callers that manage their own salts
pub fn generate_salt(size: usize) -> Vec<u8> {
    let mut salt = vec![0u8; size];
    rand::rng().fill_bytes(&mut salt);
    salt
}
