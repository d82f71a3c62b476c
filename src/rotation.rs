// src/rotation.rs
//! Key lifetime policy
//!
//! Keys are never rotated in place. A successor is created ahead of time with
//! an activation date equal to the current key's expiry, so there is no gap
//! in which a purpose has no current key and no overlap decision to make.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::consts::{DEFAULT_KEY_LIFETIME_DAYS, DEFAULT_RENEWAL_WINDOW_DAYS};
use crate::keyring::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    default_lifetime: Duration,
    renewal_window: Duration,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            default_lifetime: Duration::days(DEFAULT_KEY_LIFETIME_DAYS),
            renewal_window: Duration::days(DEFAULT_RENEWAL_WINDOW_DAYS),
        }
    }
}

impl RotationPolicy {
    pub fn new(default_lifetime: Duration, renewal_window: Duration) -> Self {
        Self {
            default_lifetime,
            renewal_window,
        }
    }

    /// Lifetime given to bootstrapped, rotated and successor keys
    pub fn default_lifetime(&self) -> Duration {
        self.default_lifetime
    }

    /// How far ahead of expiry a successor gets provisioned
    pub fn renewal_window(&self) -> Duration {
        self.renewal_window
    }

    /// Validity window of the key that should be created now, if any.
    ///
    /// * no current key: one active from `now`
    /// * current key expires outside the renewal window: nothing
    /// * a non-revoked key already covers the instant the current one
    ///   expires: nothing
    /// * otherwise: a successor starting at the current key's expiry
    pub fn successor_window(
        &self,
        keys: &[Arc<Key>],
        purpose: &str,
        now: DateTime<Utc>,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let Some(current) = select_current(keys, purpose, now) else {
            return Some((now, now + self.default_lifetime));
        };

        let handover = current.expires_at();
        if handover - now > self.renewal_window {
            return None;
        }

        let covered = keys.iter().any(|k| {
            k.purpose() == purpose
                && k.id() != current.id()
                && !k.is_revoked()
                && k.activates_at() <= handover
                && k.expires_at() > handover
        });
        if covered {
            None
        } else {
            Some((handover, handover + self.default_lifetime))
        }
    }
}

/// The key eligible for new encryptions: latest `activates_at` among keys
/// that are neither revoked nor expired at `now`, ties broken by highest id
pub(crate) fn select_current(
    keys: &[Arc<Key>],
    purpose: &str,
    now: DateTime<Utc>,
) -> Option<Arc<Key>> {
    keys.iter()
        .filter(|k| k.purpose() == purpose && k.is_active_at(now))
        .max_by(|a, b| {
            a.activates_at()
                .cmp(&b.activates_at())
                .then(a.id().cmp(&b.id()))
        })
        .cloned()
}
