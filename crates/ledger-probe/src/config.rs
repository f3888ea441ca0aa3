//! Harness configuration.
//!
//! The only settings the harness needs are where the ledger service lives
//! and how long a single request may take. Both are validated up front:
//! a bad base address is the one failure allowed to abort a run before any
//! probe executes.

use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

/// Base address used when none is supplied.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Per-request timeout used when none is supplied.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Fatal configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid base address '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("unsupported scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    #[error("request timeout must be greater than zero")]
    ZeroTimeout,

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Validated connection settings for the ledger service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    base_url: String,
    timeout: Duration,
}

impl HarnessConfig {
    /// Creates a configuration for the given base address with the default
    /// timeout. A trailing `/` is dropped so probe paths can be appended.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let parsed = Url::parse(trimmed).map_err(|e| ConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(parsed.scheme().to_string()));
        }
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(ConfigError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "missing host".to_string(),
            });
        }

        Ok(Self {
            base_url: trimmed.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        self.timeout = timeout;
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}
