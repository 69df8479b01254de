// msg-intake-config/src/config.rs
// ============================================================================
// Module: Msg Intake Configuration
// Description: Environment-based configuration loading and validation.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Configuration is loaded from environment variables. Missing optional
//! values fall back to documented defaults; invalid values fail closed. The
//! webhook secret is optional at startup — readiness probing reports
//! not-ready and ingestion refuses traffic until it is set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable holding the shared webhook secret.
pub const WEBHOOK_SECRET_ENV: &str = "WEBHOOK_SECRET";
/// Environment variable holding the database URL.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
/// Environment variable holding the server bind address.
pub const BIND_ADDR_ENV: &str = "BIND_ADDR";
/// Environment variable holding the log level.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Default database URL when none is configured.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:///data/app.db";
/// Default bind address when none is configured.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// Maximum accepted webhook secret length in bytes.
pub(crate) const MAX_SECRET_BYTES: usize = 1024;
/// Maximum accepted database URL length in bytes.
pub(crate) const MAX_DATABASE_URL_BYTES: usize = 4096;

/// URL scheme prefix selecting the SQLite backend.
const SQLITE_SCHEME: &str = "sqlite://";
/// Database URL form selecting the in-memory backend.
const MEMORY_URL: &str = "memory://";

// ============================================================================
// SECTION: Log Level
// ============================================================================

/// Log level threshold for the structured log sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Verbose diagnostic output.
    Debug,
    /// Normal operational output.
    #[default]
    Info,
    /// Unexpected but recoverable conditions.
    Warning,
    /// Failures requiring attention.
    Error,
}

impl LogLevel {
    /// Returns the uppercase label used in log lines.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(ConfigError::Invalid(format!("unknown log level: {other}"))),
        }
    }
}

// ============================================================================
// SECTION: Store Backend
// ============================================================================

/// Storage backend selected by the database URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Durable SQLite store at the given file path.
    Sqlite(PathBuf),
    /// Non-durable in-memory store.
    Memory,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration value failed validation.
    #[error("config error: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Msg Intake service configuration.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    /// Shared secret for webhook signature verification, if configured.
    pub webhook_secret: Option<String>,
    /// Database URL selecting and locating the store backend.
    pub database_url: String,
    /// Socket address the HTTP server binds to.
    pub bind: SocketAddr,
    /// Log level threshold.
    pub log_level: LogLevel,
}

impl IntakeConfig {
    /// Loads configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when any configured value fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration from an explicit lookup function.
    ///
    /// Tests supply a closure instead of mutating process-global state.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when any configured value fails validation.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let webhook_secret = match lookup(WEBHOOK_SECRET_ENV) {
            None => None,
            // An empty secret is treated as unset so readiness fails closed.
            Some(secret) if secret.is_empty() => None,
            Some(secret) => {
                if secret.len() > MAX_SECRET_BYTES {
                    return Err(ConfigError::Invalid(
                        "webhook secret exceeds length limit".to_string(),
                    ));
                }
                Some(secret)
            }
        };
        let database_url =
            lookup(DATABASE_URL_ENV).unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        if database_url.is_empty() || database_url.len() > MAX_DATABASE_URL_BYTES {
            return Err(ConfigError::Invalid("database url length out of range".to_string()));
        }
        let bind_raw = lookup(BIND_ADDR_ENV).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind: SocketAddr = bind_raw
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid bind address: {bind_raw}")))?;
        let log_level = match lookup(LOG_LEVEL_ENV) {
            None => LogLevel::default(),
            Some(raw) => raw.parse()?,
        };
        Ok(Self {
            webhook_secret,
            database_url,
            bind,
            log_level,
        })
    }

    /// Returns true iff all configuration required for ingestion is present.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.webhook_secret.is_some()
    }

    /// Resolves the store backend from the database URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the URL resolves to an empty path.
    pub fn store_backend(&self) -> Result<StoreBackend, ConfigError> {
        let url = self.database_url.as_str();
        if url == MEMORY_URL || url == ":memory:" {
            return Ok(StoreBackend::Memory);
        }
        let path = url.strip_prefix(SQLITE_SCHEME).unwrap_or(url);
        if path.is_empty() {
            return Err(ConfigError::Invalid("database url resolves to an empty path".to_string()));
        }
        Ok(StoreBackend::Sqlite(PathBuf::from(path)))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
