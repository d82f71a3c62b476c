// src/bin/field_keys.rs
//! Key ring administration and the legacy field migration
//!
//! ```text
//! field_keys migrate [--force]
//! field_keys rotate <purpose>
//! field_keys revoke <key-id>
//! field_keys list [purpose]
//! field_keys ensure-fresh
//! ```

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use encrypted_field_vault::consts::LEGACY_MIGRATION_NAME;
use encrypted_field_vault::db::{SqliteKeyStore, SqliteRecordStore};
use encrypted_field_vault::{load_config, KeyId, KeyRing, LegacyCipher, MigrationEngine, SecretField};
use tracing::{info, warn};

const USAGE: &str = "usage: field_keys <migrate [--force] | rotate <purpose> | revoke <key-id> | list [purpose] | ensure-fresh>";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!(USAGE);
    };

    let config = load_config().context("Failed to load configuration")?;
    let store = SqliteKeyStore::from_config(config).context("Failed to open key ring database")?;
    let ring = KeyRing::open(Arc::new(store), config.rotation_policy())
        .context("Failed to load key ring (wrong EFV_KEY_ENCRYPTION_KEY?)")?;

    match (command.as_str(), args.get(1).map(String::as_str)) {
        ("migrate", flag) => {
            let force = matches!(flag, Some("--force"));
            let records =
                SqliteRecordStore::from_config(config).context("Failed to open records database")?;

            if records.migration_completed(LEGACY_MIGRATION_NAME)? && !force {
                info!("{LEGACY_MIGRATION_NAME} already completed; pass --force to re-run");
                return Ok(());
            }

            let legacy = LegacyCipher::from_config(config)?;
            let report = MigrationEngine::new(&records, legacy, Arc::clone(&ring)).run()?;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if !report.is_complete() {
                bail!(
                    "migration incomplete: {} failed update(s), {} failed field(s)",
                    report.failed_updates.len(),
                    report.fields_failed
                );
            }
            if report.can_mark_completed() {
                records.mark_migration_completed(
                    LEGACY_MIGRATION_NAME,
                    &format!("{} field(s) migrated", report.fields_migrated),
                )?;
            } else {
                warn!(
                    fields_unreadable = report.fields_unreadable,
                    fields_migrated = report.fields_migrated,
                    "some values did not decrypt with the legacy key; \
                     {LEGACY_MIGRATION_NAME} left unmarked (check EFV_LEGACY_MASTER_KEY and skip_kdf_slowdown)"
                );
            }
        }
        ("rotate", Some(purpose)) => {
            let key = ring.rotate(purpose)?;
            info!("Rotated {purpose} → key {}", key.id());
        }
        ("revoke", Some(id)) => {
            let id: KeyId = id.parse()?;
            let key = ring.revoke(id)?;
            info!("Revoked key {} ({})", key.id(), key.purpose());
        }
        ("list", purpose) => {
            let keys = match purpose {
                Some(p) => ring.keys(p),
                None => ring.all_keys(),
            };
            println!("{}", serde_json::to_string_pretty(&keys)?);
        }
        ("ensure-fresh", None) => {
            for field in SecretField::ALL {
                let purpose = field.purpose();
                match ring.ensure_fresh_key(&purpose)? {
                    Some(key) => info!(
                        "{purpose}: created key {} active from {}",
                        key.id(),
                        key.activates_at()
                    ),
                    None => info!("{purpose}: current key is fresh"),
                }
            }
        }
        _ => bail!(USAGE),
    }

    Ok(())
}
