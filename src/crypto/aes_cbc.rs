// src/crypto/aes_cbc.rs
//! AES-256-CBC with PKCS7 padding, the block payload inside both envelope schemes

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::aliases::{Iv, SubKey};
use crate::error::{CoreError, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

pub(crate) fn encrypt(key: &SubKey, iv: &Iv, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256CbcEnc::new_from_slices(key.expose_secret(), iv.expose_secret())
        .map_err(|e| CoreError::crypto(format!("cipher init: {e}")))?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

pub(crate) fn decrypt(key: &SubKey, iv: &Iv, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256CbcDec::new_from_slices(key.expose_secret(), iv.expose_secret())
        .map_err(|e| CoreError::crypto(format!("cipher init: {e}")))?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CoreError::crypto("padding is invalid or ciphertext is corrupted"))
}
