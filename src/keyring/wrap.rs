// src/keyring/wrap.rs
//! AES-256-GCM wrapping of ring key material at rest
//!
//! Blob format: `[nonce: 12][ciphertext + tag]`, AAD = key id || purpose,
//! so a wrapped blob cannot be moved to another key row undetected.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use zeroize::Zeroizing;

use super::KeyId;
use crate::aliases::{KeyMaterial, WrappingKey};
use crate::consts::WRAP_NONCE_SIZE;
use crate::error::{CoreError, Result};

pub struct KeyWrapper {
    cipher: Aes256Gcm,
}

impl KeyWrapper {
    pub fn new(kek: &WrappingKey) -> Result<Self> {
        let cipher = Aes256Gcm::new_from_slice(kek.expose_secret())
            .map_err(|e| CoreError::KeyStore(format!("invalid key-encryption key: {e}")))?;
        Ok(Self { cipher })
    }

    pub fn wrap(&self, id: KeyId, purpose: &str, material: &KeyMaterial) -> Result<Vec<u8>> {
        let mut nonce = [0u8; WRAP_NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce);
        let aad = associated_data(id, purpose);

        let sealed = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: material.expose_secret(),
                    aad: &aad,
                },
            )
            .map_err(|_| CoreError::KeyStore(format!("failed to wrap key {id}")))?;

        let mut blob = Vec::with_capacity(WRAP_NONCE_SIZE + sealed.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&sealed);
        Ok(blob)
    }

    pub fn unwrap(&self, id: KeyId, purpose: &str, blob: &[u8]) -> Result<KeyMaterial> {
        if blob.len() <= WRAP_NONCE_SIZE {
            return Err(CoreError::KeyStore(format!("wrapped key {id} is truncated")));
        }
        let (nonce, sealed) = blob.split_at(WRAP_NONCE_SIZE);
        let aad = associated_data(id, purpose);

        let material = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: &aad,
                },
            )
            .map(Zeroizing::new)
            .map_err(|_| {
                CoreError::KeyStore(format!(
                    "cannot unwrap key {id}: wrong key-encryption key or tampered row"
                ))
            })?;

        KeyMaterial::from_slice(&material)
            .ok_or_else(|| CoreError::KeyStore(format!("key {id} has the wrong length")))
    }
}

fn associated_data(id: KeyId, purpose: &str) -> Vec<u8> {
    let mut aad = Vec::with_capacity(16 + purpose.len());
    aad.extend_from_slice(id.as_bytes());
    aad.extend_from_slice(purpose.as_bytes());
    aad
}
