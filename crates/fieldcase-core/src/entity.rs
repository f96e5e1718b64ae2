//! Entity descriptors driving the generic reconciler.
//!
//! Every synchronized entity kind is described by one `EntityDescriptor`
//! (table, payload columns, parent link, REST segment). The reconciler, the
//! identity resolver, and the sync orchestrator are all parameterized by a
//! descriptor instead of being written once per entity.

use crate::models::ParentKind;

/// All synchronized entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Case,
    License,
    AdminNote,
    Contact,
    Contractor,
    AttachedDoc,
    Payment,
    Inspection,
    Location,
    CaseSetting,
}

/// One domain payload column: name plus declared SQLite type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: &'static str,
}

const fn text(name: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        sql_type: "TEXT",
    }
}

const fn integer(name: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        sql_type: "INTEGER",
    }
}

const fn real(name: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        sql_type: "REAL",
    }
}

/// Static description of how one entity kind is persisted and fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub kind: EntityKind,
    /// Local table name.
    pub table: &'static str,
    /// REST collection segment under the owning parent (or at the root for
    /// parent kinds).
    pub path_segment: &'static str,
    /// Domain payload columns, in insert order. Metadata columns are shared
    /// and appended by the store layer.
    pub payload_columns: &'static [ColumnDef],
    /// Child kinds carry `parent_kind`/`parent_id` columns and roll edits up
    /// to their owning Case/License row.
    pub has_parent: bool,
}

impl EntityDescriptor {
    /// Position of a payload column, if present.
    pub fn payload_index(&self, column: &str) -> Option<usize> {
        self.payload_columns.iter().position(|c| c.name == column)
    }
}

const CASE: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Case,
    table: "cases",
    path_segment: "cases",
    payload_columns: &[
        text("case_number"),
        text("case_type"),
        text("status"),
        text("description"),
        text("applicant_name"),
        text("address"),
    ],
    has_parent: false,
};

const LICENSE: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::License,
    table: "licenses",
    path_segment: "licenses",
    payload_columns: &[
        text("license_number"),
        text("license_type"),
        text("status"),
        text("description"),
        text("holder_name"),
        text("address"),
    ],
    has_parent: false,
};

const ADMIN_NOTE: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::AdminNote,
    table: "admin_notes",
    path_segment: "admin-notes",
    payload_columns: &[text("note_text"), text("author")],
    has_parent: true,
};

const CONTACT: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Contact,
    table: "contacts",
    path_segment: "contacts",
    payload_columns: &[text("full_name"), text("role"), text("phone"), text("email")],
    has_parent: true,
};

const CONTRACTOR: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Contractor,
    table: "contractors",
    path_segment: "contractors",
    payload_columns: &[
        text("company_name"),
        text("trade"),
        text("registration_number"),
        text("phone"),
    ],
    has_parent: true,
};

const ATTACHED_DOC: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::AttachedDoc,
    table: "attached_docs",
    path_segment: "documents",
    payload_columns: &[
        text("file_name"),
        text("mime_type"),
        integer("size_bytes"),
        text("document_id"),
        text("remote_url"),
    ],
    has_parent: true,
};

const PAYMENT: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Payment,
    table: "payments",
    path_segment: "payments",
    payload_columns: &[
        integer("amount_cents"),
        text("method"),
        text("status"),
        text("receipt_number"),
    ],
    has_parent: true,
};

const INSPECTION: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Inspection,
    table: "inspections",
    path_segment: "inspections",
    payload_columns: &[
        text("inspection_type"),
        text("scheduled_utc"),
        text("result"),
        text("inspector"),
    ],
    has_parent: true,
};

const LOCATION: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Location,
    table: "locations",
    path_segment: "locations",
    payload_columns: &[
        text("address_line"),
        text("city"),
        text("postal_code"),
        real("latitude"),
        real("longitude"),
    ],
    has_parent: true,
};

const CASE_SETTING: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::CaseSetting,
    table: "case_settings",
    path_segment: "settings",
    payload_columns: &[text("setting_key"), text("setting_value")],
    has_parent: true,
};

impl EntityKind {
    /// The eight sub-screen child kinds, in sync order.
    pub const CHILD_KINDS: [Self; 8] = [
        Self::AdminNote,
        Self::Contact,
        Self::Contractor,
        Self::AttachedDoc,
        Self::Payment,
        Self::Inspection,
        Self::Location,
        Self::CaseSetting,
    ];

    /// Static descriptor for this kind.
    #[must_use]
    pub const fn descriptor(self) -> &'static EntityDescriptor {
        match self {
            Self::Case => &CASE,
            Self::License => &LICENSE,
            Self::AdminNote => &ADMIN_NOTE,
            Self::Contact => &CONTACT,
            Self::Contractor => &CONTRACTOR,
            Self::AttachedDoc => &ATTACHED_DOC,
            Self::Payment => &PAYMENT,
            Self::Inspection => &INSPECTION,
            Self::Location => &LOCATION,
            Self::CaseSetting => &CASE_SETTING,
        }
    }

    /// Descriptor for a parent kind.
    #[must_use]
    pub const fn of_parent(parent: ParentKind) -> &'static EntityDescriptor {
        match parent {
            ParentKind::Case => &CASE,
            ParentKind::License => &LICENSE,
        }
    }

    /// The parent kind this entity kind represents, if it is one.
    #[must_use]
    pub const fn as_parent(self) -> Option<ParentKind> {
        match self {
            Self::Case => Some(ParentKind::Case),
            Self::License => Some(ParentKind::License),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_kinds_all_have_parents() {
        for kind in EntityKind::CHILD_KINDS {
            assert!(kind.descriptor().has_parent, "{kind:?} must be a child");
        }
    }

    #[test]
    fn parent_kinds_have_no_parent_link() {
        assert!(!EntityKind::Case.descriptor().has_parent);
        assert!(!EntityKind::License.descriptor().has_parent);
    }

    #[test]
    fn tables_are_unique() {
        let mut tables: Vec<&str> = EntityKind::CHILD_KINDS
            .iter()
            .map(|k| k.descriptor().table)
            .chain([CASE.table, LICENSE.table])
            .collect();
        tables.sort_unstable();
        tables.dedup();
        assert_eq!(tables.len(), 10);
    }

    #[test]
    fn payload_index_finds_document_id() {
        let desc = EntityKind::AttachedDoc.descriptor();
        assert_eq!(desc.payload_index("document_id"), Some(3));
        assert_eq!(desc.payload_index("missing"), None);
    }
}
