//! Sync client configuration.
//!
//! Values come from a JSON file and can be overridden by `HALAQA_*`
//! environment variables. Validation happens once, in [`SyncConfig::validate`],
//! so the rest of the crate can rely on a normalized base URL.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sync::RetryPolicy;
use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

pub const ENV_API_URL: &str = "HALAQA_API_URL";
pub const ENV_API_TOKEN: &str = "HALAQA_API_TOKEN";
pub const ENV_MAX_REJECTED_ATTEMPTS: &str = "HALAQA_MAX_REJECTED_ATTEMPTS";

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Consecutive rejections after which a queued record is dropped.
    /// Absent means rejected records are retried on every drain.
    #[serde(default)]
    pub max_rejected_attempts: Option<u32>,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncConfig")
            .field("api_base_url", &self.api_base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_rejected_attempts", &self.max_rejected_attempts)
            .finish()
    }
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_token: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_rejected_attempts: None,
        }
    }
}

impl SyncConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: Some(api_base_url.into()),
            ..Self::default()
        }
    }

    /// Load config from a JSON file; a missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|error| {
            Error::Config(format!(
                "failed to parse config at {}: {error}",
                path.display()
            ))
        })
    }

    /// Override fields from `HALAQA_*` environment variables
    pub fn apply_env(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = normalize_text_option(lookup(ENV_API_URL)) {
            self.api_base_url = Some(url);
        }
        if let Some(token) = normalize_text_option(lookup(ENV_API_TOKEN)) {
            self.api_token = Some(token);
        }
        if let Some(raw) = normalize_text_option(lookup(ENV_MAX_REJECTED_ATTEMPTS)) {
            let limit = raw.parse::<u32>().map_err(|_| {
                Error::Config(format!(
                    "{ENV_MAX_REJECTED_ATTEMPTS} must be a positive integer, got '{raw}'"
                ))
            })?;
            self.max_rejected_attempts = Some(limit);
        }
        Ok(self)
    }

    /// Normalize and check the config, returning it ready for use
    pub fn validate(mut self) -> Result<Self> {
        let url = normalize_text_option(self.api_base_url.take())
            .ok_or_else(|| Error::Config(format!("api_base_url is required (or set {ENV_API_URL})")))?;
        if !is_http_url(&url) {
            return Err(Error::Config(
                "api_base_url must include http:// or https://".to_string(),
            ));
        }
        self.api_base_url = Some(url.trim_end_matches('/').to_string());
        self.api_token = normalize_text_option(self.api_token.take());

        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_rejected_attempts == Some(0) {
            return Err(Error::Config(
                "max_rejected_attempts must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }

    pub fn is_configured(&self) -> bool {
        normalize_text_option(self.api_base_url.clone()).is_some()
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_rejected_attempts: self.max_rejected_attempts,
        }
    }
}
