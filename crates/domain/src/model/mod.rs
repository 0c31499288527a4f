//! Data structures shared across the storage adapters and the API binary.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use thiserror::Error;

/// Upper bound on externally supplied provider identifiers.
pub const PROVIDER_ID_MAX_LENGTH: usize = 128;

/// Upper bound on admin-editable configuration keys.
pub const CONFIG_KEY_MAX_LENGTH: usize = 64;

/// Errors emitted when a user-supplied provider id fails validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderIdError {
    #[error("provider id is required")]
    Empty,
    #[error("provider id must be at most {PROVIDER_ID_MAX_LENGTH} characters")]
    TooLong,
    #[error("provider id contains unsupported characters")]
    InvalidCharacter,
}

/// Validates that the supplied id is non-empty, bounded and made of
/// `[A-Za-z0-9_.:-]` (import jobs emit ids such as `osm:node:123`).
pub fn validate_provider_id(id: &str) -> Result<(), ProviderIdError> {
    if id.is_empty() {
        return Err(ProviderIdError::Empty);
    }

    if id.len() > PROVIDER_ID_MAX_LENGTH {
        return Err(ProviderIdError::TooLong);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-'))
    {
        return Err(ProviderIdError::InvalidCharacter);
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn parse(id: &str) -> Result<Self, ProviderIdError> {
        let trimmed = id.trim();
        validate_provider_id(trimmed)?;
        Ok(Self::new(trimmed))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<&str> for ProviderId {
    fn from(value: &str) -> Self {
        Self::new(value.to_owned())
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a provider record came from. Fixed at creation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ProviderSource {
    /// Bulk-imported from a public directory; contacts are already public.
    DirectoryImport,
    /// Registered by the provider; contacts are paid leads.
    UserSubmitted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRecord {
    pub id: ProviderId,
    pub name: String,
    pub source: ProviderSource,
    pub balance: i64,
    pub contacts: ContactDetails,
    /// Set once an administrator has reviewed the listing.
    pub verified: bool,
    pub is_premium: bool,
    pub created_at: DateTime<Utc>,
}

/// Catalog entry handed over by the import jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProvider {
    pub id: ProviderId,
    pub name: String,
    pub source: ProviderSource,
    pub balance: i64,
    pub contacts: ContactDetails,
}

/// Aggregate numbers shown on the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOverview {
    pub total: u64,
    pub metered: u64,
    pub premium: u64,
    pub total_balance: i64,
}

/// Errors emitted when an admin-supplied config key fails validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigKeyError {
    #[error("config key is required")]
    Empty,
    #[error("config key must be at most {CONFIG_KEY_MAX_LENGTH} characters")]
    TooLong,
    #[error("config key may only contain letters, digits, `_`, `.` and `-`")]
    InvalidCharacter,
}

pub fn validate_config_key(key: &str) -> Result<(), ConfigKeyError> {
    if key.is_empty() {
        return Err(ConfigKeyError::Empty);
    }
    if key.len() > CONFIG_KEY_MAX_LENGTH {
        return Err(ConfigKeyError::TooLong);
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(ConfigKeyError::InvalidCharacter);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConfigEntry {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Coarse daily counters. Increment-only and approximate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DailyMetric {
    Leads,
    ClicksAffiliate,
    Visits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStat {
    pub day: NaiveDate,
    pub metric: DailyMetric,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    UpdateConfig,
    RevealContact,
    VerifyMaster,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub action: AuditAction,
    pub details: serde_json::Value,
    pub actor_ip: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl NewAuditEntry {
    pub fn now(action: AuditAction, details: serde_json::Value, actor_ip: Option<String>) -> Self {
        Self {
            action,
            details,
            actor_ip,
            recorded_at: Utc::now(),
        }
    }
}
