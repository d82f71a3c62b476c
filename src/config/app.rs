// src/config/app.rs
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Duration;
use serde::Deserialize;
use tracing::warn;
use zeroize::Zeroizing;

use super::defaults::*;
use crate::aliases::{MasterKey, WrappingKey};
use crate::consts::{DEV_KDF_ITERATIONS, LEGACY_KDF_ITERATIONS};
use crate::error::{CoreError, Result};
use crate::rotation::RotationPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub keys: Keys,
    pub paths: Paths,
    #[serde(default = "default_rotation")]
    pub rotation: Rotation,
    pub features: Features,
}

/// Base64-encoded 256-bit secrets
#[derive(Clone, Deserialize)]
pub struct Keys {
    pub legacy_master_key: String,
    pub key_encryption_key: String,
}

impl std::fmt::Debug for Keys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Keys { .. }")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paths {
    pub key_ring_db: String,
    pub records_db: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rotation {
    pub default_key_lifetime_days: i64,
    pub renewal_window_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Features {
    pub use_dev_keys: bool,
    pub skip_kdf_slowdown: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            keys: default_keys(),
            paths: default_paths(),
            rotation: default_rotation(),
            features: default_features(),
        }
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load config once from `EFV_CONFIG` or `field-vault.toml`, else built-in defaults
pub fn load() -> Result<&'static Config> {
    if let Some(conf) = CONFIG.get() {
        return Ok(conf);
    }

    let config_path =
        std::env::var("EFV_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let conf = if Path::new(&config_path).exists() {
        load_from(&config_path)?
    } else {
        warn!(path = %config_path, "config file not found, using built-in defaults");
        Config::default()
    };

    Ok(CONFIG.get_or_init(|| conf))
}

/// Parse a config file without touching the global
pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let conf: Config = toml::from_str(&content)
        .map_err(|e| CoreError::Config(format!("{}: {e}", path.as_ref().display())))?;

    if conf.rotation.default_key_lifetime_days <= 0 {
        return Err(CoreError::Config(
            "rotation.default_key_lifetime_days must be positive".into(),
        ));
    }
    if conf.rotation.renewal_window_days < 0 {
        return Err(CoreError::Config(
            "rotation.renewal_window_days must not be negative".into(),
        ));
    }
    Ok(conf)
}

impl Config {
    /// Legacy master key: `EFV_LEGACY_MASTER_KEY`, else the config value when dev keys are allowed
    pub fn legacy_master_key(&self) -> Result<MasterKey> {
        let encoded = self.secret(
            "EFV_LEGACY_MASTER_KEY",
            &self.keys.legacy_master_key,
            DEFAULT_LEGACY_MASTER_KEY,
        )?;
        let bytes = decode_key(&encoded, "legacy_master_key")?;
        MasterKey::from_slice(&bytes)
            .ok_or_else(|| CoreError::Config("legacy_master_key must be 32 bytes".into()))
    }

    /// Key-encryption key for ring material at rest
    pub fn key_encryption_key(&self) -> Result<WrappingKey> {
        let encoded = self.secret(
            "EFV_KEY_ENCRYPTION_KEY",
            &self.keys.key_encryption_key,
            DEFAULT_KEY_ENCRYPTION_KEY,
        )?;
        let bytes = decode_key(&encoded, "key_encryption_key")?;
        WrappingKey::from_slice(&bytes)
            .ok_or_else(|| CoreError::Config("key_encryption_key must be 32 bytes".into()))
    }

    pub fn key_ring_db_path(&self) -> PathBuf {
        std::env::var("EFV_KEY_RING_DB")
            .unwrap_or_else(|_| self.paths.key_ring_db.clone())
            .into()
    }

    pub fn records_db_path(&self) -> PathBuf {
        std::env::var("EFV_RECORDS_DB")
            .unwrap_or_else(|_| self.paths.records_db.clone())
            .into()
    }

    pub fn legacy_kdf_iterations(&self) -> u32 {
        if self.features.skip_kdf_slowdown {
            DEV_KDF_ITERATIONS
        } else {
            LEGACY_KDF_ITERATIONS
        }
    }

    pub fn rotation_policy(&self) -> RotationPolicy {
        RotationPolicy::new(
            Duration::days(self.rotation.default_key_lifetime_days),
            Duration::days(self.rotation.renewal_window_days),
        )
    }

    fn secret(&self, env_var: &str, configured: &str, dev_default: &str) -> Result<Zeroizing<String>> {
        if let Ok(value) = std::env::var(env_var) {
            return Ok(Zeroizing::new(value));
        }
        if !self.features.use_dev_keys {
            return Err(CoreError::Config(format!(
                "{env_var} required when use_dev_keys = false"
            )));
        }
        if configured == dev_default {
            warn!(env_var, "using built-in development key; never do this in production");
        }
        Ok(Zeroizing::new(configured.to_owned()))
    }
}

fn decode_key(encoded: &str, name: &str) -> Result<Zeroizing<Vec<u8>>> {
    STANDARD
        .decode(encoded.trim())
        .map(Zeroizing::new)
        .map_err(|e| CoreError::Config(format!("{name} is not valid base64: {e}")))
}
