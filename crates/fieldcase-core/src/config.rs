//! Client configuration for the sync engine.
//!
//! `SyncSettings` carries the safe-to-ship endpoint and credential values the
//! sync orchestrator needs. Secret material is provided at runtime, never
//! compiled in.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::{is_http_url, normalize_text_option};

/// Configuration for talking to the remote case-management backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncSettings {
    /// Backend base URL (e.g. `https://api.example.gov/field`)
    pub api_base_url: Option<String>,
    /// Bearer token for authenticated requests
    pub api_token: Option<String>,
    /// Automatic background sync interval (default: 60 seconds)
    pub sync_interval: Option<Duration>,
}

impl SyncSettings {
    /// Create a new sync configuration
    pub fn new(api_base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            api_base_url: Some(api_base_url.into()),
            api_token: Some(api_token.into()),
            sync_interval: Some(Duration::from_secs(60)),
        }
    }

    /// Set the automatic sync interval
    #[must_use]
    pub const fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    /// Disable automatic sync (manual sync only)
    #[must_use]
    pub const fn without_auto_sync(mut self) -> Self {
        self.sync_interval = None;
        self
    }

    /// Check if sync is configured
    pub const fn is_configured(&self) -> bool {
        self.api_base_url.is_some() && self.api_token.is_some()
    }

    /// Validate and normalize the configuration.
    ///
    /// Trims whitespace, drops empty values, and requires an http(s) base URL
    /// with no trailing slash.
    pub fn normalized(self) -> Result<Self, String> {
        let api_base_url = match normalize_text_option(self.api_base_url) {
            Some(url) if is_http_url(&url) => Some(url.trim_end_matches('/').to_string()),
            Some(url) => {
                return Err(format!("api_base_url must include http:// or https://: {url}"));
            }
            None => None,
        };
        let api_token = normalize_text_option(self.api_token);

        Ok(Self {
            api_base_url,
            api_token,
            sync_interval: self.sync_interval,
        })
    }
}
