// src/config/mod.rs
//! Configuration system for encrypted-field-vault
//!
//! Central, lazy-loaded global config with TOML + env overrides.

pub use app::{load, load_from, Config, Features, Keys, Paths, Rotation};

mod app;
mod defaults;
