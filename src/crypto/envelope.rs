// src/crypto/envelope.rs
//! Envelope formats and scheme detection
//!
//! Rotating envelope, after the `efv2.` prefix, base64url without padding:
//!
//! ```text
//! [version: 1][purpose_len: u16 BE][purpose: UTF-8][key_id: 16][iv: 16][ciphertext: 16*n][hmac: 32]
//! ```
//!
//! The HMAC covers every byte before it, header included.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::aliases::Iv;
use crate::consts::{IV_SIZE, ROTATING_ENVELOPE_PREFIX, ROTATING_ENVELOPE_VERSION, TAG_SIZE};
use crate::error::{CoreError, Result};
use crate::keyring::KeyId;

const KEY_ID_SIZE: usize = 16;
const FIXED_OVERHEAD: usize = 1 + 2 + KEY_ID_SIZE + IV_SIZE + TAG_SIZE;

/// Which scheme produced an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeScheme {
    /// `base64(salt || iv || ciphertext)` under the fixed master key
    Legacy,
    /// `efv2.` + key-ring envelope
    Rotating,
}

impl EnvelopeScheme {
    /// Classify by shape alone. `None` for the empty string.
    pub fn detect(envelope: &str) -> Option<Self> {
        if envelope.is_empty() {
            None
        } else if envelope.starts_with(ROTATING_ENVELOPE_PREFIX) {
            Some(EnvelopeScheme::Rotating)
        } else {
            Some(EnvelopeScheme::Legacy)
        }
    }
}

/// Purpose and key id carried in a rotating envelope's header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub purpose: String,
    pub key_id: KeyId,
}

/// Read the header without verifying anything
pub fn read_header(envelope: &str) -> Result<EnvelopeHeader> {
    Ok(ParsedEnvelope::parse(envelope)?.header)
}

pub(crate) struct ParsedEnvelope {
    pub header: EnvelopeHeader,
    pub iv: Iv,
    raw: Vec<u8>,
    ciphertext_start: usize,
}

impl ParsedEnvelope {
    pub fn parse(envelope: &str) -> Result<Self> {
        let body = envelope
            .strip_prefix(ROTATING_ENVELOPE_PREFIX)
            .ok_or_else(|| CoreError::invalid("not a rotating envelope"))?;
        let raw = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|e| CoreError::invalid(format!("envelope body is not valid base64url: {e}")))?;

        if raw.len() < FIXED_OVERHEAD {
            return Err(CoreError::invalid("envelope is truncated"));
        }
        if raw[0] != ROTATING_ENVELOPE_VERSION {
            return Err(CoreError::invalid(format!(
                "unsupported envelope version {}",
                raw[0]
            )));
        }

        let purpose_len = u16::from_be_bytes([raw[1], raw[2]]) as usize;
        let purpose_end = 3 + purpose_len;
        let key_id_end = purpose_end + KEY_ID_SIZE;
        let iv_end = key_id_end + IV_SIZE;
        if raw.len() < iv_end + TAG_SIZE {
            return Err(CoreError::invalid("envelope is truncated"));
        }

        let purpose = std::str::from_utf8(&raw[3..purpose_end])
            .map_err(|_| CoreError::invalid("envelope purpose is not UTF-8"))?
            .to_owned();
        let key_id_bytes: [u8; KEY_ID_SIZE] = raw[purpose_end..key_id_end]
            .try_into()
            .map_err(|_| CoreError::invalid("envelope key id"))?;
        let iv = Iv::from_slice(&raw[key_id_end..iv_end])
            .ok_or_else(|| CoreError::invalid("envelope iv"))?;

        Ok(ParsedEnvelope {
            header: EnvelopeHeader {
                purpose,
                key_id: KeyId::from_bytes(key_id_bytes),
            },
            iv,
            raw,
            ciphertext_start: iv_end,
        })
    }

    /// Everything the tag authenticates
    pub fn signed_bytes(&self) -> &[u8] {
        &self.raw[..self.raw.len() - TAG_SIZE]
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.raw[self.ciphertext_start..self.raw.len() - TAG_SIZE]
    }

    pub fn tag(&self) -> &[u8] {
        &self.raw[self.raw.len() - TAG_SIZE..]
    }
}

/// Serialize header + payload; `sign` receives the bytes to authenticate
pub(crate) fn encode<F>(
    purpose: &str,
    key_id: KeyId,
    iv: &Iv,
    ciphertext: &[u8],
    sign: F,
) -> Result<String>
where
    F: FnOnce(&[u8]) -> Result<[u8; TAG_SIZE]>,
{
    let purpose_len = u16::try_from(purpose.len())
        .map_err(|_| CoreError::invalid("purpose is longer than 65535 bytes"))?;

    let mut raw = Vec::with_capacity(FIXED_OVERHEAD + purpose.len() + ciphertext.len());
    raw.push(ROTATING_ENVELOPE_VERSION);
    raw.extend_from_slice(&purpose_len.to_be_bytes());
    raw.extend_from_slice(purpose.as_bytes());
    raw.extend_from_slice(key_id.as_bytes());
    raw.extend_from_slice(iv.expose_secret());
    raw.extend_from_slice(ciphertext);

    let tag = sign(&raw)?;
    raw.extend_from_slice(&tag);

    Ok(format!("{ROTATING_ENVELOPE_PREFIX}{}", URL_SAFE_NO_PAD.encode(raw)))
}
