// src/error.rs
//! Public error type for the entire crate

use thiserror::Error;

use crate::keyring::KeyId;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Empty or structurally invalid input; the caller's fault, never retried
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Padding/MAC failure, bad encoding, corrupted ciphertext
    #[error("Crypto operation failed: {0}")]
    Crypto(String),

    /// The envelope names a key the ring does not hold
    #[error("Key {key_id} not found for purpose '{purpose}'")]
    KeyNotFound { purpose: String, key_id: KeyId },

    /// Key material could not be wrapped, unwrapped or decoded from storage
    #[error("Key store error: {0}")]
    KeyStore(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Sql(#[from] rusqlite::Error),
}

impl CoreError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        CoreError::InvalidArgument(msg.into())
    }

    pub(crate) fn crypto(msg: impl Into<String>) -> Self {
        CoreError::Crypto(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
