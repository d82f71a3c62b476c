// src/config/defaults.rs
use crate::config::app::{Features, Keys, Paths, Rotation};
use crate::consts::{DEFAULT_KEY_LIFETIME_DAYS, DEFAULT_RENEWAL_WINDOW_DAYS};

/// Master key baked into every legacy envelope written before key rotation existed.
/// Only here so old values stay readable; real deployments inject it via env.
pub const DEFAULT_LEGACY_MASTER_KEY: &str = "K7gNU3sdo+OL0wNhqoVWhr3g6s1xYv72ol/pe/Unols=";
pub const DEFAULT_KEY_ENCRYPTION_KEY: &str = "ZGV2LWtleS1lbmNyeXB0aW9uLWtleS0yMDI1LTAwMDE=";

pub const DEFAULT_CONFIG_PATH: &str = "field-vault.toml";

pub fn default_keys() -> Keys {
    Keys {
        legacy_master_key: DEFAULT_LEGACY_MASTER_KEY.into(),
        key_encryption_key: DEFAULT_KEY_ENCRYPTION_KEY.into(),
    }
}

pub fn default_paths() -> Paths {
    Paths {
        key_ring_db: "data/keys.db".into(),
        records_db: "data/records.db".into(),
    }
}

pub fn default_rotation() -> Rotation {
    Rotation {
        default_key_lifetime_days: DEFAULT_KEY_LIFETIME_DAYS,
        renewal_window_days: DEFAULT_RENEWAL_WINDOW_DAYS,
    }
}

pub fn default_features() -> Features {
    Features {
        use_dev_keys: true,
        skip_kdf_slowdown: false,
    }
}
