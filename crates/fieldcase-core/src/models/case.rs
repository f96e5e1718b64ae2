//! Domain views over generic stored records.
//!
//! Case and License rows share the same payload layout (number, type, status,
//! description, party name, address), so one summary type serves both parent
//! kinds. Child kinds flow through the generic record shapes; `AdminNote` is
//! the one typed convenience the CLI creates directly.

use libsql::Value;

use super::ids::ContentItemId;
use super::meta::{ParentKind, ParentRef, SyncMeta};
use super::record::{IncomingRecord, StoredRecord};
use crate::entity::EntityKind;

/// Display summary of a Case or License row.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CaseSummary {
    pub kind: ParentKind,
    pub content_item_id: ContentItemId,
    pub number: Option<String>,
    pub record_type: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub party_name: Option<String>,
    pub address: Option<String>,
    pub sub_screen_edited: bool,
    pub meta: SyncMeta,
}

impl CaseSummary {
    /// Build a summary from a stored parent record.
    ///
    /// Relies on the Case and License descriptors sharing payload positions.
    #[must_use]
    pub fn from_record(kind: ParentKind, record: &StoredRecord) -> Self {
        let text = |index: usize| -> Option<String> {
            match record.payload.get(index) {
                Some(Value::Text(text)) => Some(text.clone()),
                _ => None,
            }
        };

        Self {
            kind,
            content_item_id: record.content_item_id.clone(),
            number: text(0),
            record_type: text(1),
            status: text(2),
            description: text(3),
            party_name: text(4),
            address: text(5),
            sub_screen_edited: record.sub_screen_edited,
            meta: record.meta.clone(),
        }
    }
}

/// An administrative note attached to a Case or License.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AdminNote {
    pub content_item_id: ContentItemId,
    pub parent: ParentRef,
    pub note_text: String,
    pub author: Option<String>,
    pub meta: SyncMeta,
}

impl AdminNote {
    /// Create a new note for offline capture, with a local-only id.
    #[must_use]
    pub fn new_offline(parent: ParentRef, note_text: impl Into<String>, author: Option<String>) -> Self {
        let now = crate::util::unix_timestamp_millis();
        Self {
            content_item_id: ContentItemId::local(),
            parent,
            note_text: note_text.into(),
            author,
            meta: SyncMeta::offline_created(now),
        }
    }

    /// The generic record shape the reconciler consumes.
    #[must_use]
    pub fn to_incoming(&self) -> IncomingRecord {
        IncomingRecord::new(
            self.content_item_id.clone(),
            Some(self.parent.clone()),
            vec![
                Value::Text(self.note_text.clone()),
                self.author
                    .clone()
                    .map_or(Value::Null, Value::Text),
            ],
        )
    }

    /// Parse a stored admin-note record.
    pub fn from_record(record: &StoredRecord) -> crate::Result<Self> {
        let descriptor = EntityKind::AdminNote.descriptor();
        let parent = record.parent.clone().ok_or_else(|| {
            crate::Error::Database("admin_notes row missing parent reference".to_string())
        })?;
        let note_text = match record.payload_value(descriptor, "note_text") {
            Some(Value::Text(text)) => text.clone(),
            _ => String::new(),
        };
        let author = match record.payload_value(descriptor, "author") {
            Some(Value::Text(text)) => Some(text.clone()),
            _ => None,
        };

        Ok(Self {
            content_item_id: record.content_item_id.clone(),
            parent,
            note_text,
            author,
            meta: record.meta.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_offline_note_is_dirty_with_local_id() {
        let parent = ParentRef::new(ParentKind::Case, "case-1");
        let note = AdminNote::new_offline(parent, "gate locked, rescheduled", None);

        assert!(note.content_item_id.is_local());
        assert!(note.meta.is_edited);
        assert!(note.meta.is_force_sync);
    }

    #[test]
    fn to_incoming_orders_payload_by_descriptor() {
        let parent = ParentRef::new(ParentKind::License, "lic-2");
        let note = AdminNote::new_offline(parent, "renewal docs pending", Some("mk".into()));
        let incoming = note.to_incoming();

        assert_eq!(incoming.payload.len(), 2);
        assert_eq!(
            incoming.payload[0],
            Value::Text("renewal docs pending".into())
        );
        assert_eq!(incoming.payload[1], Value::Text("mk".into()));
    }
}
