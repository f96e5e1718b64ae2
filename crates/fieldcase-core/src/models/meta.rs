//! Sync metadata shared by every synchronized entity row.

use serde::{Deserialize, Serialize};

use super::ids::{ContentItemId, CorrelationId};

/// The two parent entity kinds all sub-screen records hang off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParentKind {
    Case,
    License,
}

impl ParentKind {
    /// Table holding rows of this parent kind.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Case => "cases",
            Self::License => "licenses",
        }
    }

    /// REST collection segment for this parent kind.
    #[must_use]
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::Case => "cases",
            Self::License => "licenses",
        }
    }

    /// Stored discriminator value for child rows' `parent_kind` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Case => "case",
            Self::License => "license",
        }
    }

    /// Parse a stored discriminator value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "case" => Some(Self::Case),
            "license" => Some(Self::License),
            _ => None,
        }
    }
}

/// A reference to the owning Case or License of a child record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentRef {
    pub kind: ParentKind,
    pub id: ContentItemId,
}

impl ParentRef {
    pub fn new(kind: ParentKind, id: impl Into<ContentItemId>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// The dirty-flag and correlation state carried by every synchronized row.
///
/// Flags are stored as 0/1 INTEGER columns; this struct is the typed view the
/// rest of the engine works with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMeta {
    /// Correlation token of the pending mutation, if one is queued.
    pub correlation_id: Option<CorrelationId>,
    /// Local copy holds a user change not yet confirmed by the server.
    pub is_edited: bool,
    /// A locally-queued write has been acknowledged by the server.
    pub is_sync: bool,
    /// Record was created fully offline and must be explicitly pushed.
    pub is_force_sync: bool,
    /// The forced push has been acknowledged.
    pub is_force_sync_success: bool,
    /// The parent Case/License was not locally present at creation time and a
    /// stub had to be materialized first.
    pub not_in_offline: bool,
    /// Server-side change stamp, display and tie-breaking only.
    pub api_change_date_utc: Option<String>,
    /// Creation timestamp (Unix ms).
    pub created_utc: i64,
    /// Last local modification timestamp (Unix ms).
    pub modified_utc: i64,
}

impl SyncMeta {
    /// Metadata for a row written from a server fetch: clean and in sync.
    #[must_use]
    pub fn from_server(api_change_date_utc: Option<String>, now: i64) -> Self {
        Self {
            correlation_id: None,
            is_edited: false,
            is_sync: true,
            is_force_sync: false,
            is_force_sync_success: false,
            not_in_offline: false,
            api_change_date_utc,
            created_utc: now,
            modified_utc: now,
        }
    }

    /// Metadata for a record created by a user while offline: dirty, queued
    /// for force sync, carrying a fresh correlation token.
    #[must_use]
    pub fn offline_created(now: i64) -> Self {
        Self {
            correlation_id: Some(CorrelationId::new()),
            is_edited: true,
            is_sync: false,
            is_force_sync: true,
            is_force_sync_success: false,
            not_in_offline: false,
            api_change_date_utc: None,
            created_utc: now,
            modified_utc: now,
        }
    }

    /// Whether this record still holds state the server has not confirmed.
    #[must_use]
    pub const fn has_unsynced_state(&self) -> bool {
        self.is_edited || (self.is_force_sync && !self.is_force_sync_success)
    }

    /// Whether the record is eligible for local pruning on its own terms
    /// (parent-reference protection is checked separately).
    #[must_use]
    pub const fn prunable(&self) -> bool {
        !self.is_edited && self.is_sync && (!self.is_force_sync || self.is_force_sync_success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_kind_round_trips_discriminator() {
        assert_eq!(ParentKind::parse("case"), Some(ParentKind::Case));
        assert_eq!(ParentKind::parse("license"), Some(ParentKind::License));
        assert_eq!(ParentKind::parse("permit"), None);
    }

    #[test]
    fn server_meta_is_clean() {
        let meta = SyncMeta::from_server(Some("2026-08-01T12:00:00Z".into()), 1_000);
        assert!(!meta.is_edited);
        assert!(meta.is_sync);
        assert!(!meta.has_unsynced_state());
        assert!(meta.prunable());
    }

    #[test]
    fn offline_meta_is_dirty_and_forced() {
        let meta = SyncMeta::offline_created(1_000);
        assert!(meta.is_edited);
        assert!(meta.is_force_sync);
        assert!(meta.correlation_id.is_some());
        assert!(meta.has_unsynced_state());
        assert!(!meta.prunable());
    }

    #[test]
    fn force_synced_record_becomes_prunable_once_acknowledged() {
        let mut meta = SyncMeta::offline_created(1_000);
        meta.is_edited = false;
        meta.is_sync = true;
        meta.is_force_sync_success = false;
        assert!(!meta.prunable());

        meta.is_force_sync_success = true;
        assert!(meta.prunable());
    }
}
