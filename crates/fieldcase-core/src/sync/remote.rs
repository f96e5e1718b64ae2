//! Remote API client boundary and reachability oracle.
//!
//! The sync core only depends on the two traits here; the reqwest-backed
//! client is the production implementation, and tests swap in scripted
//! fakes.

use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::config::SyncSettings;
use crate::util::compact_text;

/// Errors surfaced by a sync pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The reachability oracle reported offline; nothing was attempted.
    #[error("Device is offline; sync was not attempted")]
    Offline,

    /// Base URL or token missing; nothing was attempted.
    #[error("Sync is not configured: {0}")]
    MissingConfig(String),

    /// The request never reached the server or the response was malformed.
    /// Always retryable; never mutates local dirty flags.
    #[error("Sync transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-2xx top-level response.
    #[error("Sync API error: {0}")]
    Api(String),

    /// A response body did not match the expected shape.
    #[error("Invalid sync payload: {0}")]
    InvalidPayload(String),

    /// A local store failure aborted the pass.
    #[error(transparent)]
    Store(#[from] crate::Error),
}

/// Result alias for sync-level operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// A successful (2xx) response from the backend.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

/// The remote case-management backend, as the sync core sees it.
#[allow(async_fn_in_trait)]
pub trait RemoteApi {
    /// Fetch a collection or detail resource.
    async fn get(&self, path: &str) -> SyncResult<ApiResponse>;

    /// Push a mutation with the configured auth token.
    async fn post_with_token(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> SyncResult<ApiResponse>;
}

/// Network-reachability oracle consulted before every sync decision.
pub trait Reachability {
    /// Whether remote calls should be attempted right now.
    fn is_online(&self) -> bool;
}

/// Reachability backed by a settable flag.
///
/// Clients update it from their platform connectivity events; tests toggle
/// it directly.
#[derive(Debug, Default)]
pub struct StaticReachability {
    online: AtomicBool,
}

impl StaticReachability {
    /// Create an oracle with the given initial state
    #[must_use]
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    /// Update the connectivity state.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Reachability for StaticReachability {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// reqwest-backed backend client with bearer-token auth.
#[derive(Clone)]
pub struct HttpRemoteApi {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemoteApi {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemoteApi")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl HttpRemoteApi {
    /// Build a client from validated settings.
    pub fn new(settings: &SyncSettings) -> SyncResult<Self> {
        let settings = settings
            .clone()
            .normalized()
            .map_err(SyncError::MissingConfig)?;
        let base_url = settings
            .api_base_url
            .ok_or_else(|| SyncError::MissingConfig("api_base_url is not set".to_string()))?;
        let token = settings
            .api_token
            .ok_or_else(|| SyncError::MissingConfig("api_token is not set".to_string()))?;

        Ok(Self {
            base_url,
            token,
            client: reqwest::Client::builder().build()?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn handle(response: reqwest::Response) -> SyncResult<ApiResponse> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Api(parse_api_error(status, &body)));
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .unwrap_or(serde_json::Value::Null);
        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}

impl RemoteApi for HttpRemoteApi {
    async fn get(&self, path: &str) -> SyncResult<ApiResponse> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .send()
            .await?;
        Self::handle(response).await
    }

    async fn post_with_token(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> SyncResult<ApiResponse> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;
        Self::handle(response).await
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
