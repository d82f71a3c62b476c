// tests/full_strength_migration_tests.rs
//! End-to-end at full KDF strength with the historical master key

mod common;
use common::{fields, memory_ring, setup};

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use encrypted_field_vault::config::Config;
use encrypted_field_vault::consts::LEGACY_KDF_ITERATIONS;
use encrypted_field_vault::db::{NewDataSource, SqliteRecordStore};
use encrypted_field_vault::{EnvelopeScheme, LegacyCipher, MigrationEngine, SecretField, SourceType};

const PASSWORD: &str = "SecureP@ssw0rd!";

#[test]
fn legacy_password_migrates_to_rotating_envelope() {
    setup();
    let master_key = Config::default().legacy_master_key().unwrap();
    let legacy = LegacyCipher::new(master_key);
    assert_eq!(legacy.iterations(), LEGACY_KDF_ITERATIONS);

    let legacy_envelope = legacy.encrypt(PASSWORD).unwrap();
    assert!(STANDARD.decode(&legacy_envelope).is_ok());
    assert_ne!(legacy_envelope.len(), PASSWORD.len());
    assert_eq!(legacy.decrypt(&legacy_envelope).unwrap(), PASSWORD);

    let store = SqliteRecordStore::in_memory().unwrap();
    let id = store
        .insert(&NewDataSource {
            name: "billing api".into(),
            description: Some("seeded before key rotation".into()),
            source_type: SourceType::Url,
            secrets: fields(&[(SecretField::Password, legacy_envelope.as_str())]),
        })
        .unwrap();

    let ring = memory_ring();
    let report = MigrationEngine::new(&store, legacy, Arc::clone(&ring))
        .run()
        .unwrap();
    assert_eq!(report.fields_migrated, 1);

    let migrated = store.get(id).unwrap().unwrap().secrets[&SecretField::Password].clone();
    assert_ne!(migrated, legacy_envelope);
    assert_eq!(EnvelopeScheme::detect(&migrated), Some(EnvelopeScheme::Rotating));
    assert_eq!(
        ring.protector(&SecretField::Password.purpose())
            .decrypt(&migrated)
            .unwrap(),
        PASSWORD
    );
}
