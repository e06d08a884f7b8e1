use crate::events::LogFormat;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Environment variable names read by [`RuntimeConfig::from_env`]
pub const ENV_MAX_BRANCH_DEPTH: &str = "CAST_VM_MAX_BRANCH_DEPTH";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "CAST_VM_HTTP_TIMEOUT_SECS";
pub const ENV_HTTP_RETRIES: &str = "CAST_VM_HTTP_RETRIES";
pub const ENV_RETRY_BACKOFF_MS: &str = "CAST_VM_RETRY_BACKOFF_MS";
pub const ENV_SHEETS_API_BASE: &str = "CAST_VM_SHEETS_API_BASE";
pub const ENV_LOG_FORMAT: &str = "CAST_VM_LOG_FORMAT";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// Runtime settings shared by every VM instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeConfig {
    /// Deepest allowed nesting of branch programs
    pub max_branch_depth: usize,
    pub http_timeout_secs: u64,
    /// Extra attempts for outbound calls that were never delivered
    pub http_retries: u32,
    pub retry_backoff_ms: u64,
    pub sheets_api_base: String,
    pub log_format: LogFormat,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_branch_depth: 16,
            http_timeout_secs: 10,
            http_retries: 2,
            retry_backoff_ms: 200,
            sheets_api_base: "https://sheets.googleapis.com".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl RuntimeConfig {
    /// Load settings from the environment, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            max_branch_depth: parse_var(ENV_MAX_BRANCH_DEPTH, defaults.max_branch_depth)?,
            http_timeout_secs: parse_var(ENV_HTTP_TIMEOUT_SECS, defaults.http_timeout_secs)?,
            http_retries: parse_var(ENV_HTTP_RETRIES, defaults.http_retries)?,
            retry_backoff_ms: parse_var(ENV_RETRY_BACKOFF_MS, defaults.retry_backoff_ms)?,
            sheets_api_base: env::var(ENV_SHEETS_API_BASE).unwrap_or(defaults.sheets_api_base),
            log_format: parse_var(ENV_LOG_FORMAT, defaults.log_format)?,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Backoff before retry number `attempt` (1-based), doubling each time
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}
