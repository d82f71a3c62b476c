// tests/migration_tests.rs
//! Legacy → rotating migration over the in-memory and SQLite record stores

mod common;
use common::{fast_legacy, fields, memory_ring, setup, test_master_key, MemoryRecordStore};

use std::sync::Arc;

use encrypted_field_vault::db::{NewDataSource, SqliteRecordStore};
use encrypted_field_vault::migration::FailedUpdate;
use encrypted_field_vault::aliases::MasterKey;
use encrypted_field_vault::consts::LEGACY_MIGRATION_NAME;
use encrypted_field_vault::{
    CancelToken, EnvelopeScheme, KeyRing, LegacyCipher, MigrationEngine, RecordId, SecretField,
    SourceType,
};

use SecretField::*;

fn decrypt(ring: &Arc<KeyRing>, field: SecretField, envelope: &str) -> String {
    ring.protector(&field.purpose()).decrypt(envelope).unwrap()
}

fn is_rotating(value: &str) -> bool {
    EnvelopeScheme::detect(value) == Some(EnvelopeScheme::Rotating)
}

/// One record per variant with every sensitive field legacy-encrypted
fn seed_all_variants(store: &MemoryRecordStore) -> Vec<(RecordId, SourceType)> {
    let legacy = fast_legacy();
    SourceType::ALL
        .into_iter()
        .map(|source_type| {
            let values = source_type
                .sensitive_fields()
                .iter()
                .map(|f| (*f, legacy.encrypt(&format!("{source_type}-{f}")).unwrap()))
                .collect();
            (store.add(source_type, values), source_type)
        })
        .collect()
}

#[test]
fn migrates_every_variant() {
    setup();
    let store = MemoryRecordStore::new();
    let seeded = seed_all_variants(&store);
    let ring = memory_ring();

    let report = MigrationEngine::new(&store, fast_legacy(), Arc::clone(&ring))
        .run()
        .unwrap();

    // File has no secrets and is never enumerated
    assert_eq!(report.records_scanned, 5);
    assert_eq!(report.records_updated, 5);
    assert_eq!(report.fields_migrated, 9);
    assert_eq!(report.fields_already_rotating, 0);
    assert_eq!(report.fields_unreadable, 0);
    assert!(report.can_mark_completed());

    for (id, source_type) in seeded {
        for field in source_type.sensitive_fields() {
            let stored = store.value(id, *field);
            assert!(is_rotating(&stored), "{source_type}.{field} not migrated");
            assert_eq!(decrypt(&ring, *field, &stored), format!("{source_type}-{field}"));
        }
    }
}

#[test]
fn second_run_is_a_no_op() {
    let store = MemoryRecordStore::new();
    let seeded = seed_all_variants(&store);
    let ring = memory_ring();

    MigrationEngine::new(&store, fast_legacy(), Arc::clone(&ring))
        .run()
        .unwrap();
    let after_first: Vec<_> = seeded.iter().map(|(id, _)| store.fields(*id)).collect();
    let keys_after_first = ring.all_keys().len();

    let report = MigrationEngine::new(&store, fast_legacy(), Arc::clone(&ring))
        .run()
        .unwrap();
    assert_eq!(report.fields_migrated, 0);
    assert_eq!(report.records_updated, 0);
    assert_eq!(report.fields_already_rotating, 9);
    assert_eq!(report.fields_unreadable, 0);
    assert!(report.can_mark_completed());

    let after_second: Vec<_> = seeded.iter().map(|(id, _)| store.fields(*id)).collect();
    assert_eq!(after_first, after_second);
    assert_eq!(ring.all_keys().len(), keys_after_first);
}

#[test]
fn corrupted_field_is_skipped_and_valid_sibling_migrates() {
    let store = MemoryRecordStore::new();
    let legacy = fast_legacy();
    let good = legacy.encrypt("valid api key").unwrap();
    let id = store.add(
        SourceType::Url,
        fields(&[(Password, "garbage-not-an-envelope"), (ApiKey, good.as_str())]),
    );
    let ring = memory_ring();

    let report = MigrationEngine::new(&store, legacy, Arc::clone(&ring))
        .run()
        .unwrap();

    assert_eq!(report.fields_migrated, 1);
    assert_eq!(report.fields_unreadable, 1);
    assert_eq!(report.records_updated, 1);
    assert!(report.is_complete());
    assert!(!report.can_mark_completed());
    assert_eq!(store.value(id, Password), "garbage-not-an-envelope");
    assert_eq!(decrypt(&ring, ApiKey, &store.value(id, ApiKey)), "valid api key");
}

#[test]
fn empty_values_are_ignored() {
    let store = MemoryRecordStore::new();
    let secret = fast_legacy().encrypt("only this").unwrap();
    let id = store.add(
        SourceType::S3,
        fields(&[(AccessKey, ""), (SecretKey, secret.as_str())]),
    );
    store.add(SourceType::Database, fields(&[(ConnectionString, "")]));

    let report = MigrationEngine::new(&store, fast_legacy(), memory_ring())
        .run()
        .unwrap();

    assert_eq!(report.records_scanned, 2);
    assert_eq!(report.fields_migrated, 1);
    assert_eq!(report.fields_unreadable, 0);
    assert_eq!(store.value(id, AccessKey), "");
}

#[test]
fn one_update_per_record() {
    let store = MemoryRecordStore::new();
    let legacy = fast_legacy();
    let a = legacy.encrypt("a").unwrap();
    let b = legacy.encrypt("b").unwrap();
    let c = legacy.encrypt("c").unwrap();
    let url = store.add(
        SourceType::Url,
        fields(&[(Password, a.as_str()), (ApiKey, b.as_str()), (BearerToken, c.as_str())]),
    );
    // nothing legacy in here, so no write at all
    store.add(SourceType::Ftp, fields(&[(Password, "plain")]));

    MigrationEngine::new(&store, legacy, memory_ring())
        .run()
        .unwrap();

    assert_eq!(store.update_calls(), vec![url]);
}

#[test]
fn failed_update_does_not_stop_the_run() {
    let store = MemoryRecordStore::new();
    let seeded = seed_all_variants(&store);
    let (broken, broken_type) = seeded[0];
    store.fail_updates_for(broken);
    let before = store.fields(broken);

    let report = MigrationEngine::new(&store, fast_legacy(), memory_ring())
        .run()
        .unwrap();

    assert_eq!(report.records_updated, 4);
    assert_eq!(report.failed_updates.len(), 1);
    let FailedUpdate { id, source_type, error } = &report.failed_updates[0];
    assert_eq!((*id, *source_type), (broken, broken_type));
    assert!(error.contains("disk full"));
    assert!(!report.is_complete());
    assert_eq!(store.fields(broken), before);
}

#[test]
fn cancellation_between_records() {
    let store = MemoryRecordStore::new();
    let seeded = seed_all_variants(&store);
    let cancel = CancelToken::new();
    store.cancel_after_first_update(cancel.clone());

    let report = MigrationEngine::new(&store, fast_legacy(), memory_ring())
        .with_cancel_token(cancel)
        .run()
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.records_updated, 1);
    assert!(!report.is_complete());

    // the record in flight was written whole, the rest untouched
    let (first, first_type) = seeded[0];
    assert!(first_type
        .sensitive_fields()
        .iter()
        .all(|f| is_rotating(&store.value(first, *f))));
    let untouched = seeded
        .iter()
        .skip(1)
        .filter(|(_, t)| !t.sensitive_fields().is_empty())
        .all(|(id, _)| store.fields(*id).values().all(|v| !is_rotating(v)));
    assert!(untouched);
}

#[test]
fn cancelled_before_start_writes_nothing() {
    let store = MemoryRecordStore::new();
    seed_all_variants(&store);
    let engine = MigrationEngine::new(&store, fast_legacy(), memory_ring());
    engine.cancel_token().cancel();

    let report = engine.run().unwrap();
    assert!(report.cancelled);
    assert!(store.update_calls().is_empty());
}

#[test]
fn one_key_per_purpose_for_the_whole_run() {
    let store = MemoryRecordStore::new();
    let legacy = fast_legacy();
    for i in 0..10 {
        let pw = legacy.encrypt(&format!("pw-{i}")).unwrap();
        store.add(SourceType::Ftp, fields(&[(Password, pw.as_str())]));
    }
    let ring = memory_ring();

    MigrationEngine::new(&store, legacy, Arc::clone(&ring))
        .run()
        .unwrap();

    assert_eq!(ring.keys(&Password.purpose()).len(), 1);
    assert_eq!(ring.all_keys().len(), 1);
}

#[test]
fn nothing_to_migrate_creates_no_keys() {
    let store = MemoryRecordStore::new();
    store.add(SourceType::File, fields(&[]));
    let ring = memory_ring();

    let report = MigrationEngine::new(&store, fast_legacy(), Arc::clone(&ring))
        .run()
        .unwrap();

    assert_eq!(report.fields_migrated, 0);
    assert!(ring.all_keys().is_empty());
}

#[test]
fn migrates_sqlite_records_in_place() {
    let store = SqliteRecordStore::in_memory().unwrap();
    let legacy = fast_legacy();
    let conn_string = legacy.encrypt("Server=db;Password=p").unwrap();
    let id = store
        .insert(&NewDataSource {
            name: "warehouse".into(),
            description: None,
            source_type: SourceType::AzureBlob,
            secrets: fields(&[(ConnectionString, conn_string.as_str())]),
        })
        .unwrap();
    let ring = memory_ring();

    let report = MigrationEngine::new(&store, legacy, Arc::clone(&ring))
        .run()
        .unwrap();
    assert_eq!(report.fields_migrated, 1);

    let stored = store.get(id).unwrap().unwrap().secrets[&ConnectionString].clone();
    assert!(is_rotating(&stored));
    assert_eq!(decrypt(&ring, ConnectionString, &stored), "Server=db;Password=p");
}

#[test]
fn wrong_iteration_count_leaves_values_and_blocks_the_guard() {
    setup();
    let store = MemoryRecordStore::new();
    // written at a higher count than the migration is configured with
    let stronger = LegacyCipher::with_iterations(test_master_key(), 2_000);
    let id = store.add(
        SourceType::Ftp,
        fields(&[(Password, stronger.encrypt("ftp pw").unwrap().as_str())]),
    );
    let before = store.fields(id);
    let ring = memory_ring();

    let report = MigrationEngine::new(&store, fast_legacy(), Arc::clone(&ring))
        .run()
        .unwrap();

    assert_eq!(report.fields_migrated, 0);
    assert_eq!(report.fields_unreadable, 1);
    assert!(report.is_complete());
    assert!(!report.can_mark_completed());
    assert_eq!(store.fields(id), before);
    assert!(store.update_calls().is_empty());
}

#[test]
fn wrong_master_key_leaves_the_sqlite_guard_unset() {
    let store = SqliteRecordStore::in_memory().unwrap();
    let secret = fast_legacy().encrypt("secret").unwrap();
    store
        .insert(&NewDataSource {
            name: "bucket".into(),
            description: None,
            source_type: SourceType::S3,
            secrets: fields(&[(SecretKey, secret.as_str())]),
        })
        .unwrap();
    let mistyped = LegacyCipher::with_iterations(MasterKey::new([0x24; 32]), 1_000);

    let report = MigrationEngine::new(&store, mistyped, memory_ring())
        .run()
        .unwrap();
    if report.can_mark_completed() {
        store.mark_migration_completed(LEGACY_MIGRATION_NAME, "done").unwrap();
    }
    assert_eq!(report.fields_unreadable, 1);
    assert!(!store.migration_completed(LEGACY_MIGRATION_NAME).unwrap());

    // the right key later migrates and can mark the run
    let report = MigrationEngine::new(&store, fast_legacy(), memory_ring())
        .run()
        .unwrap();
    assert_eq!(report.fields_migrated, 1);
    assert!(report.can_mark_completed());
}
