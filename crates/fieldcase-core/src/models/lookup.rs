//! Lookup/dropdown cache entries.
//!
//! Reference data the server owns outright: cached locally by the same
//! upsert pattern as entities, but without dirty-flag tracking.

use serde::{Deserialize, Serialize};

/// The cached lookup collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    CaseStatus,
    CaseType,
    CaseTypeSetting,
    TeamMember,
}

impl LookupKind {
    /// All lookup collections, in refresh order.
    pub const ALL: [Self; 4] = [
        Self::CaseStatus,
        Self::CaseType,
        Self::CaseTypeSetting,
        Self::TeamMember,
    ];

    /// Local cache table for this collection.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::CaseStatus => "lookup_case_statuses",
            Self::CaseType => "lookup_case_types",
            Self::CaseTypeSetting => "lookup_case_type_settings",
            Self::TeamMember => "lookup_team_members",
        }
    }

    /// REST collection segment.
    #[must_use]
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::CaseStatus => "lookups/case-statuses",
            Self::CaseType => "lookups/case-types",
            Self::CaseTypeSetting => "lookups/case-type-settings",
            Self::TeamMember => "lookups/team-members",
        }
    }
}

/// One key/label pair of a lookup collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupEntry {
    pub key: String,
    pub label: String,
}
