// src/aliases.rs
//! Secret-holding newtypes
//!
//! These are the canonical types used throughout encrypted-field-vault.
//! Every one of them zeroizes its bytes on drop and never prints them.

use std::fmt;

use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::consts::{IV_SIZE, KEY_SIZE, SALT_SIZE};

macro_rules! fixed_secret {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Zeroize, ZeroizeOnDrop)]
        pub struct $name([u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Fresh bytes from the thread-local CSPRNG
            pub fn random() -> Self {
                let mut bytes = [0u8; $len];
                rand::rng().fill_bytes(&mut bytes);
                Self(bytes)
            }

            /// Copy out of a slice; `None` if the length is wrong
            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                let arr: [u8; $len] = bytes.try_into().ok()?;
                Some(Self(arr))
            }

            pub fn expose_secret(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(concat!(stringify!($name), "([REDACTED])"))
            }
        }
    };
}

fixed_secret!(
    /// 256-bit raw key material held by a ring key
    KeyMaterial,
    KEY_SIZE
);
fixed_secret!(
    /// The legacy scheme's master key (PBKDF2 password input)
    MasterKey,
    KEY_SIZE
);
fixed_secret!(
    /// Key-encryption key used to wrap ring material at rest
    WrappingKey,
    KEY_SIZE
);
fixed_secret!(
    /// Per-purpose AES or HMAC subkey
    SubKey,
    KEY_SIZE
);
fixed_secret!(Salt, SALT_SIZE);
fixed_secret!(Iv, IV_SIZE);
