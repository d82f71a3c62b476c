// src/records.rs
//! Data-source variants and their secret fields
//!
//! Which fields are secret is a property of the variant, fixed at compile
//! time. Field protection is pure: it takes a map of values and returns a
//! new map, leaving the caller's record untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::PURPOSE_PREFIX;
use crate::crypto::FieldCrypto;
use crate::error::{CoreError, Result};

/// Closed set of record variants, stored as the `source_type` discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourceType {
    Url,
    File,
    Ftp,
    Database,
    AzureBlob,
    S3,
}

impl SourceType {
    pub const ALL: [SourceType; 6] = [
        SourceType::Url,
        SourceType::File,
        SourceType::Ftp,
        SourceType::Database,
        SourceType::AzureBlob,
        SourceType::S3,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Url => "Url",
            SourceType::File => "File",
            SourceType::Ftp => "Ftp",
            SourceType::Database => "Database",
            SourceType::AzureBlob => "AzureBlob",
            SourceType::S3 => "S3",
        }
    }

    /// Fields that must never be stored in clear text for this variant
    pub fn sensitive_fields(self) -> &'static [SecretField] {
        use SecretField::*;
        match self {
            SourceType::Url => &[Password, ApiKey, BearerToken],
            SourceType::File => &[],
            SourceType::Ftp => &[Password, PrivateKeyPath],
            SourceType::Database => &[ConnectionString],
            SourceType::AzureBlob => &[ConnectionString],
            SourceType::S3 => &[AccessKey, SecretKey],
        }
    }

    pub fn is_sensitive(self, field: SecretField) -> bool {
        self.sensitive_fields().contains(&field)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        SourceType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::invalid(format!("unknown source type '{s}'")))
    }
}

/// Every secret column across all variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SecretField {
    Password,
    ApiKey,
    BearerToken,
    PrivateKeyPath,
    ConnectionString,
    AccessKey,
    SecretKey,
}

impl SecretField {
    pub const ALL: [SecretField; 7] = [
        SecretField::Password,
        SecretField::ApiKey,
        SecretField::BearerToken,
        SecretField::PrivateKeyPath,
        SecretField::ConnectionString,
        SecretField::AccessKey,
        SecretField::SecretKey,
    ];

    /// Column name in `data_sources`
    pub fn column(self) -> &'static str {
        match self {
            SecretField::Password => "password",
            SecretField::ApiKey => "api_key",
            SecretField::BearerToken => "bearer_token",
            SecretField::PrivateKeyPath => "private_key_path",
            SecretField::ConnectionString => "connection_string",
            SecretField::AccessKey => "access_key",
            SecretField::SecretKey => "secret_key",
        }
    }

    fn name(self) -> &'static str {
        match self {
            SecretField::Password => "Password",
            SecretField::ApiKey => "ApiKey",
            SecretField::BearerToken => "BearerToken",
            SecretField::PrivateKeyPath => "PrivateKeyPath",
            SecretField::ConnectionString => "ConnectionString",
            SecretField::AccessKey => "AccessKey",
            SecretField::SecretKey => "SecretKey",
        }
    }

    /// Key-ring purpose, e.g. `DataSource.SensitiveFields.v2.Password`
    pub fn purpose(self) -> String {
        format!("{PURPOSE_PREFIX}.{}", self.name())
    }
}

impl fmt::Display for SecretField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for SecretField {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        SecretField::ALL
            .into_iter()
            .find(|f| f.column() == s || f.name() == s)
            .ok_or_else(|| CoreError::invalid(format!("unknown secret field '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Secret values of one record, plaintext or envelope depending on context
pub type RecordFields = BTreeMap<SecretField, String>;

/// A stored data source. `secrets` holds envelopes as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    pub id: RecordId,
    pub name: String,
    pub description: Option<String>,
    pub source_type: SourceType,
    pub secrets: RecordFields,
}

/// Encrypt every secret value with the rotating scheme
pub fn protect_fields(
    source_type: SourceType,
    fields: &RecordFields,
    crypto: &FieldCrypto,
) -> Result<RecordFields> {
    transform(source_type, fields, |field, value| crypto.encrypt(field, value))
}

/// Decrypt every secret value, whichever scheme wrote it
pub fn unprotect_fields(
    source_type: SourceType,
    fields: &RecordFields,
    crypto: &FieldCrypto,
) -> Result<RecordFields> {
    transform(source_type, fields, |field, value| crypto.decrypt(field, value))
}

fn transform<F>(source_type: SourceType, fields: &RecordFields, mut op: F) -> Result<RecordFields>
where
    F: FnMut(SecretField, &str) -> Result<String>,
{
    check_fields(source_type, fields)?;
    fields
        .iter()
        .map(|(&field, value)| -> Result<(SecretField, String)> {
            // empty means "not set" and is stored as-is
            let out = if value.is_empty() {
                String::new()
            } else {
                op(field, value)?
            };
            Ok((field, out))
        })
        .collect()
}

/// Reject fields the variant does not have
pub fn check_fields(source_type: SourceType, fields: &RecordFields) -> Result<()> {
    match fields.keys().find(|f| !source_type.is_sensitive(**f)) {
        Some(field) => Err(CoreError::invalid(format!(
            "{source_type} data sources have no secret field '{field}'"
        ))),
        None => Ok(()),
    }
}
