// tests/rotation_tests.rs
//! Successor provisioning ahead of key expiry

mod common;
use common::memory_ring;

use chrono::{Duration, Utc};
use encrypted_field_vault::{KeyRing, RotationPolicy};

const PURPOSE: &str = "DataSource.SensitiveFields.v2.ConnectionString";

#[test]
fn default_policy_is_ten_days_with_two_day_window() {
    let policy = RotationPolicy::default();
    assert_eq!(policy.default_lifetime(), Duration::days(10));
    assert_eq!(policy.renewal_window(), Duration::days(2));
}

#[test]
fn ring_keeps_the_policy_it_was_opened_with() {
    let policy = RotationPolicy::new(Duration::days(30), Duration::days(5));
    let ring = KeyRing::in_memory(policy);
    assert_eq!(*ring.policy(), policy);
    assert_eq!(*memory_ring().policy(), RotationPolicy::default());
}

#[test]
fn bootstrapped_key_lives_for_the_default_lifetime() {
    let ring = memory_ring();
    let key = ring.current_or_bootstrap(PURPOSE).unwrap();
    assert_eq!(key.expires_at() - key.activates_at(), Duration::days(10));
}

#[test]
fn missing_key_is_bootstrapped() {
    let ring = memory_ring();
    let created = ring.ensure_fresh_key(PURPOSE).unwrap().unwrap();

    assert_eq!(ring.current_key(PURPOSE).unwrap().id(), created.id());
    assert!(ring.ensure_fresh_key(PURPOSE).unwrap().is_none());
}

#[test]
fn fresh_key_needs_no_successor() {
    let ring = memory_ring();
    let now = Utc::now();
    ring.create_key(PURPOSE, now, now + Duration::days(10)).unwrap();

    assert!(ring.ensure_fresh_key_at(PURPOSE, now).unwrap().is_none());
    assert!(ring
        .ensure_fresh_key_at(PURPOSE, now + Duration::days(7))
        .unwrap()
        .is_none());
}

#[test]
fn successor_activates_at_current_expiry() {
    let ring = memory_ring();
    let now = Utc::now();
    let current = ring.create_key(PURPOSE, now, now + Duration::days(10)).unwrap();

    let later = now + Duration::days(9);
    let successor = ring.ensure_fresh_key_at(PURPOSE, later).unwrap().unwrap();
    assert_eq!(successor.activates_at(), current.expires_at());
    assert_eq!(
        successor.expires_at(),
        current.expires_at() + Duration::days(10)
    );

    // still the old key until the handover instant
    assert_eq!(ring.current_key_at(PURPOSE, later).unwrap().id(), current.id());
    assert_eq!(
        ring.current_key_at(PURPOSE, current.expires_at())
            .unwrap()
            .id(),
        successor.id()
    );

    // covered now; a second call is a no-op
    assert!(ring.ensure_fresh_key_at(PURPOSE, later).unwrap().is_none());
    assert_eq!(ring.keys(PURPOSE).len(), 2);
}

#[test]
fn revoked_successor_is_replaced() {
    let ring = memory_ring();
    let now = Utc::now();
    ring.create_key(PURPOSE, now, now + Duration::days(10)).unwrap();

    let later = now + Duration::days(9);
    let successor = ring.ensure_fresh_key_at(PURPOSE, later).unwrap().unwrap();
    ring.revoke(successor.id()).unwrap();

    let replacement = ring.ensure_fresh_key_at(PURPOSE, later).unwrap().unwrap();
    assert_ne!(replacement.id(), successor.id());
    assert_eq!(replacement.activates_at(), successor.activates_at());
}

#[test]
fn custom_policy_is_honoured() {
    let ring = KeyRing::in_memory(RotationPolicy::new(Duration::days(30), Duration::days(5)));
    let key = ring.rotate(PURPOSE).unwrap();
    assert_eq!(key.expires_at() - key.activates_at(), Duration::days(30));

    let now = key.activates_at();
    assert!(ring
        .ensure_fresh_key_at(PURPOSE, now + Duration::days(24))
        .unwrap()
        .is_none());
    assert!(ring
        .ensure_fresh_key_at(PURPOSE, now + Duration::days(26))
        .unwrap()
        .is_some());
}
