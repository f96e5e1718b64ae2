//! Identifier newtypes shared by all synchronized entities.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix marking identifiers minted on this device before the server has
/// assigned its own.
const LOCAL_ID_PREFIX: &str = "local-";

/// The durable identifier of a synchronized record.
///
/// For records the server already knows about this holds the server-issued
/// id. Records created offline carry a client-generated, `local-` prefixed
/// UUID v7 until the identity resolver promotes them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentItemId(String);

impl ContentItemId {
    /// Wrap a server-issued identifier.
    pub fn server(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh local-only identifier (UUID v7, time-sortable).
    #[must_use]
    pub fn local() -> Self {
        Self(format!("{LOCAL_ID_PREFIX}{}", Uuid::now_v7()))
    }

    /// Whether this identifier was minted locally and still awaits promotion.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_ID_PREFIX)
    }

    /// The string form stored in the database and sent over the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ContentItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ContentItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Client-generated token accompanying a mutation queued for the server.
///
/// Unique per mutation attempt; push retries reuse the stored value so the
/// server can deduplicate offline writes that already happened.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a fresh unique token for an outbound mutation attempt.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// The string form stored in the database and sent over the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
