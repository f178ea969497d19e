// ABOUTME: Configuration loading and validation for casestore.
// ABOUTME: Reads CASESTORE_* environment variables with defaults suitable for a single-user session.

use std::path::PathBuf;
use std::time::Duration;

use casestore_access::DEFAULT_CACHE_TTL;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("CASESTORE_CACHE_TTL_SECS must be a positive integer, got {0:?}")]
    InvalidCacheTtl(String),

    #[error("CASESTORE_RETENTION_DAYS must be a non-negative integer, got {0:?}")]
    InvalidRetentionDays(String),

    #[error("CASESTORE_SLOT_KEY must not be empty or contain path separators")]
    InvalidSlotKey,
}

/// Settings for building [`crate::LocalServices`].
#[derive(Debug, Clone)]
pub struct ServicesConfig {
    pub home: PathBuf,
    pub slot_key: String,
    pub cache_ttl: Duration,
    pub console_mirror: bool,
    pub retention_days: u32,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            home: default_home(),
            slot_key: "crm_local_db".to_string(),
            cache_ttl: DEFAULT_CACHE_TTL,
            console_mirror: cfg!(debug_assertions),
            retention_days: 30,
        }
    }
}

fn default_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
        .join(".casestore")
}

fn flag(value: &str) -> bool {
    value == "true" || value == "1" || value == "yes"
}

impl ServicesConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - CASESTORE_HOME: data directory (default: ~/.casestore)
    /// - CASESTORE_SLOT_KEY: snapshot key (default: crm_local_db)
    /// - CASESTORE_CACHE_TTL_SECS: permission cache TTL (default: 300)
    /// - CASESTORE_CONSOLE_MIRROR: mirror log entries to tracing (default: on in debug builds)
    /// - CASESTORE_RETENTION_DAYS: default retention window for sweeps (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let home = std::env::var("CASESTORE_HOME")
            .map(PathBuf::from)
            .unwrap_or(defaults.home);

        let slot_key = std::env::var("CASESTORE_SLOT_KEY").unwrap_or(defaults.slot_key);
        if slot_key.is_empty() || slot_key.contains('/') || slot_key.contains('\\') {
            return Err(ConfigError::InvalidSlotKey);
        }

        let cache_ttl = match std::env::var("CASESTORE_CACHE_TTL_SECS") {
            Ok(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidCacheTtl(raw)),
            },
            Err(_) => defaults.cache_ttl,
        };

        let console_mirror = std::env::var("CASESTORE_CONSOLE_MIRROR")
            .map(|v| flag(&v))
            .unwrap_or(defaults.console_mirror);

        let retention_days = match std::env::var("CASESTORE_RETENTION_DAYS") {
            Ok(raw) => raw
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidRetentionDays(raw))?,
            Err(_) => defaults.retention_days,
        };

        Ok(Self {
            home,
            slot_key,
            cache_ttl,
            console_mirror,
            retention_days,
        })
    }
}
