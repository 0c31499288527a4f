//! Environment-driven configuration for the API binary.

use std::{env, time::Duration};

use thiserror::Error;

const DEFAULT_CONFIG_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_STORE_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_SINK_CAPACITY: usize = 1_024;
const DEFAULT_ADMIN_PRINCIPAL: &str = "admin";

/// API configuration: listeners, shared database, and the tuning knobs of
/// the ledger, config cache and side-effect sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    database_url: String,
    api_bind_address: String,
    api_unix_socket: Option<String>,
    internal_bind_address: Option<String>,
    internal_unix_socket: Option<String>,
    db_max_connections: Option<u32>,
    db_connect_timeout: Option<Duration>,
    config_cache_ttl: Duration,
    store_timeout: Duration,
    sink_capacity: usize,
    admin_sessions: Vec<AdminSessionDigest>,
    admin_principal: String,
}

/// A configured admin session: principal name plus the SHA3-256 hex digest
/// of its bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSessionDigest {
    pub principal: String,
    pub digest: String,
}

impl ApiConfig {
    /// Loads the environment variables required by the API binary.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        Ok(Self {
            database_url: get_required_var("DATABASE_URL")?,
            api_bind_address: get_required_var("API_BIND_ADDRESS")?,
            api_unix_socket: get_optional_var("API_UNIX_SOCKET"),
            internal_bind_address: get_optional_var("API_INTERNAL_BIND_ADDRESS"),
            internal_unix_socket: get_optional_var("API_INTERNAL_UNIX_SOCKET"),
            db_max_connections: get_optional_number("API_DB_MAX_CONNECTIONS")?,
            db_connect_timeout: get_optional_number("API_DB_CONNECT_TIMEOUT_MS")?
                .map(Duration::from_millis),
            config_cache_ttl: Duration::from_secs(
                get_optional_number("API_CONFIG_CACHE_TTL_SECS")?
                    .unwrap_or(DEFAULT_CONFIG_CACHE_TTL_SECS),
            ),
            store_timeout: Duration::from_millis(
                get_optional_number("API_STORE_TIMEOUT_MS")?.unwrap_or(DEFAULT_STORE_TIMEOUT_MS),
            ),
            sink_capacity: get_optional_number("API_SINK_CAPACITY")?
                .unwrap_or(DEFAULT_SINK_CAPACITY),
            admin_sessions: get_optional_var("API_ADMIN_SESSIONS")
                .map(|raw| parse_admin_sessions(&raw))
                .transpose()?
                .unwrap_or_default(),
            admin_principal: get_optional_var("API_ADMIN_PRINCIPAL")
                .unwrap_or_else(|| DEFAULT_ADMIN_PRINCIPAL.to_string()),
        })
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn api_bind_address(&self) -> &str {
        &self.api_bind_address
    }

    pub fn api_unix_socket(&self) -> Option<&str> {
        self.api_unix_socket.as_deref()
    }

    pub fn internal_bind_address(&self) -> Option<&str> {
        self.internal_bind_address.as_deref()
    }

    pub fn internal_unix_socket(&self) -> Option<&str> {
        self.internal_unix_socket.as_deref()
    }

    pub fn has_internal_listener(&self) -> bool {
        self.internal_bind_address.is_some() || self.internal_unix_socket.is_some()
    }

    pub fn db_max_connections(&self) -> Option<u32> {
        self.db_max_connections
    }

    pub fn db_connect_timeout(&self) -> Option<Duration> {
        self.db_connect_timeout
    }

    pub fn config_cache_ttl(&self) -> Duration {
        self.config_cache_ttl
    }

    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    pub fn sink_capacity(&self) -> usize {
        self.sink_capacity
    }

    pub fn admin_sessions(&self) -> &[AdminSessionDigest] {
        &self.admin_sessions
    }

    pub fn admin_principal(&self) -> &str {
        &self.admin_principal
    }
}

/// Parses `name=<sha3 hex>,name=<sha3 hex>`. A digest may appear only once,
/// otherwise one token would resolve to two principals.
fn parse_admin_sessions(raw: &str) -> Result<Vec<AdminSessionDigest>, ConfigError> {
    let mut sessions: Vec<AdminSessionDigest> = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let invalid = || ConfigError::InvalidAdminSession {
            entry: entry.to_string(),
        };
        let (principal, digest) = entry.split_once('=').ok_or_else(invalid)?;
        let (principal, digest) = (principal.trim(), digest.trim().to_ascii_lowercase());
        if principal.is_empty()
            || digest.len() != 64
            || !digest.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(invalid());
        }
        if let Some(existing) = sessions.iter().find(|session| session.digest == digest) {
            return Err(ConfigError::DuplicateAdminSession {
                first: existing.principal.clone(),
                second: principal.to_string(),
            });
        }
        sessions.push(AdminSessionDigest {
            principal: principal.to_string(),
            digest,
        });
    }
    Ok(sessions)
}

fn get_required_var(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Err(ConfigError::MissingVar { key })
            } else {
                Ok(trimmed.to_string())
            }
        }
        Err(_) => Err(ConfigError::MissingVar { key }),
    }
}

fn get_optional_var(key: &'static str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn get_optional_number<T>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    get_optional_var(key)
        .map(|value| {
            value
                .parse()
                .map_err(|source| ConfigError::InvalidNumber { key, source })
        })
        .transpose()
}

pub fn hydrate_env_file() -> Result<(), ConfigError> {
    if env::var_os("FIXIT_SKIP_DOTENV").is_some() {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(ConfigError::Dotenv { source: err }),
    }

    Ok(())
}

/// Errors emitted when `.env` hydration or environment parsing fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{key}`")]
    MissingVar { key: &'static str },
    #[error("invalid integer in `{key}`: {source}")]
    InvalidNumber {
        key: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("invalid admin session entry `{entry}` (expected `name=<64 hex chars>`)")]
    InvalidAdminSession { entry: String },
    #[error("admin sessions `{first}` and `{second}` share the same token digest")]
    DuplicateAdminSession { first: String, second: String },
    #[error("failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },
}
