// src/consts.rs
//! Shared constants: security parameters and defaults

/// PBKDF2-SHA256 iterations for the legacy master-key envelope
// Fixed by the data already on disk; changing it breaks every legacy value
pub const LEGACY_KDF_ITERATIONS: u32 = 600_000;

/// Iterations used when `skip_kdf_slowdown` is on (development only)
pub const DEV_KDF_ITERATIONS: u32 = 1_000;

/// Legacy salt length in bytes
pub const SALT_SIZE: usize = 16;

/// AES block / CBC IV length in bytes
pub const IV_SIZE: usize = 16;

/// AES-256 key length in bytes
pub const KEY_SIZE: usize = 32;

/// HMAC-SHA256 tag length appended to rotating envelopes
pub const TAG_SIZE: usize = 32;

/// AES-GCM nonce length used when wrapping key material at rest
pub const WRAP_NONCE_SIZE: usize = 12;

/// Smallest decodable legacy envelope: salt + IV + at least one byte
pub const LEGACY_MIN_ENVELOPE_LEN: usize = SALT_SIZE + IV_SIZE + 1;

/// Prefix of every rotating envelope. `.` is outside the standard base64
/// alphabet, so no legacy envelope can start with it.
pub const ROTATING_ENVELOPE_PREFIX: &str = "efv2.";

/// Binary layout version inside the rotating envelope
pub const ROTATING_ENVELOPE_VERSION: u8 = 1;

/// Default lifetime of a freshly created key
pub const DEFAULT_KEY_LIFETIME_DAYS: i64 = 10;

/// How long before expiry a successor key is provisioned
pub const DEFAULT_RENEWAL_WINDOW_DAYS: i64 = 2;

/// Name recorded in the run-once guard table for the legacy → rotating pass
pub const LEGACY_MIGRATION_NAME: &str = "legacy_aes_to_rotating_v2";

/// Purpose prefix shared by every data-source secret field
pub const PURPOSE_PREFIX: &str = "DataSource.SensitiveFields.v2";
