//! Sync and remote API configuration
//!
//! Plain serde structs with defaults, validated up front so transport
//! construction can't be handed a broken endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAYS_SECS: [u64; 3] = [30, 60, 300];
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Retry policy for the sync coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Delivery attempts per queue item before it is dead-lettered
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Back-off ladder between failed drain passes, in seconds
    #[serde(default = "default_retry_delays")]
    pub retry_delays_secs: Vec<u64>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delays_secs: DEFAULT_RETRY_DELAYS_SECS.to_vec(),
        }
    }
}

impl SyncOptions {
    /// Delay before the next re-drain after `consecutive` failed passes.
    ///
    /// Walks the ladder and stays on its last rung.
    pub fn retry_delay(&self, consecutive: usize) -> Duration {
        let last = self.retry_delays_secs.len().saturating_sub(1);
        let secs = self
            .retry_delays_secs
            .get(consecutive.min(last))
            .copied()
            .unwrap_or(DEFAULT_RETRY_DELAYS_SECS[0]);
        Duration::from_secs(secs)
    }
}

/// Remote farm-management API endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the API, e.g. `https://api.example.com`
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ApiConfig {
    /// Create a config for the given base URL with default timeouts.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }

    /// Trimmed base URL without a trailing slash.
    pub fn normalized_base_url(&self) -> Result<String> {
        let base_url = normalize_text_option(Some(self.base_url.clone()))
            .ok_or_else(|| Error::InvalidInput("API base URL must not be empty".to_string()))?;
        if !is_http_url(&base_url) {
            return Err(Error::InvalidInput(format!(
                "API base URL must be http(s): {base_url}"
            )));
        }
        Ok(base_url.trim_end_matches('/').to_string())
    }

    /// Per-request timeout as a `Duration`.
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_delays() -> Vec<u64> {
    DEFAULT_RETRY_DELAYS_SECS.to_vec()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
