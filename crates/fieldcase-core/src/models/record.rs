//! Generic record shapes moved through the reconciler.
//!
//! The engine does not hold one struct per entity kind; payloads travel as
//! ordered column values aligned with the kind's `EntityDescriptor`, so the
//! same reconcile/track/promote code serves all nine kinds.

use libsql::Value;

use crate::entity::EntityDescriptor;
use crate::error::{Error, Result};
use crate::util::camel_case;

use super::ids::{ContentItemId, CorrelationId};
use super::meta::{ParentKind, ParentRef, SyncMeta};

/// A record on its way into the local store, either fetched from the server
/// or produced by a user edit.
#[derive(Debug, Clone)]
pub struct IncomingRecord {
    pub content_item_id: ContentItemId,
    pub parent: Option<ParentRef>,
    /// Domain payload values, aligned with the descriptor's payload columns.
    pub payload: Vec<Value>,
    /// Correlation token carried by the server element, if any.
    pub correlation_id: Option<CorrelationId>,
    /// Server-side change stamp, refreshable even on locally-edited rows.
    pub api_change_date_utc: Option<String>,
    /// The owning parent was not locally present and a stub had to be
    /// materialized before this record could be stored.
    pub not_in_offline: bool,
}

impl IncomingRecord {
    /// Build a record from caller-supplied payload values.
    pub fn new(
        content_item_id: impl Into<ContentItemId>,
        parent: Option<ParentRef>,
        payload: Vec<Value>,
    ) -> Self {
        Self {
            content_item_id: content_item_id.into(),
            parent,
            payload,
            correlation_id: None,
            api_change_date_utc: None,
            not_in_offline: false,
        }
    }

    /// Mark that the parent stub had to be materialized for this record.
    #[must_use]
    pub const fn with_not_in_offline(mut self) -> Self {
        self.not_in_offline = true;
        self
    }

    /// Parse one element of a server list response.
    ///
    /// Wire objects use camelCase field names; payload fields are looked up
    /// by the camelCase form of each descriptor column. Missing fields store
    /// as NULL rather than failing the element.
    pub fn from_wire(
        descriptor: &EntityDescriptor,
        parent: Option<ParentRef>,
        element: &serde_json::Value,
    ) -> Result<Self> {
        let object = element.as_object().ok_or_else(|| {
            Error::InvalidInput(format!("{} element is not an object", descriptor.table))
        })?;

        let content_item_id = object
            .get("contentItemId")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                Error::InvalidInput(format!("{} element missing contentItemId", descriptor.table))
            })?;

        let payload = descriptor
            .payload_columns
            .iter()
            .map(|column| json_to_value(object.get(camel_case(column.name).as_str())))
            .collect();

        Ok(Self {
            content_item_id: ContentItemId::server(content_item_id),
            parent,
            payload,
            correlation_id: object
                .get("correlationId")
                .and_then(serde_json::Value::as_str)
                .map(|s| CorrelationId::from(s.to_string())),
            api_change_date_utc: object
                .get("apiChangeDateUtc")
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string),
            not_in_offline: false,
        })
    }

    /// Render the payload as a camelCase JSON object for outbound pushes.
    #[must_use]
    pub fn payload_json(&self, descriptor: &EntityDescriptor) -> serde_json::Value {
        payload_json(descriptor, &self.payload)
    }
}

/// A record as currently persisted, metadata included.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub content_item_id: ContentItemId,
    pub parent: Option<ParentRef>,
    pub payload: Vec<Value>,
    pub meta: SyncMeta,
    /// Parent rows only: a child record changed locally.
    pub sub_screen_edited: bool,
}

impl StoredRecord {
    /// Parse a row produced by the store layer's canonical record SELECT.
    ///
    /// Column order: `content_item_id`, (`parent_kind`, `parent_id` for child
    /// kinds), payload columns, then the shared metadata block, then
    /// `is_sub_screen_edited` for parent kinds.
    pub fn from_row(descriptor: &EntityDescriptor, values: &[Value]) -> Result<Self> {
        let mut cursor = RowCursor {
            table: descriptor.table,
            values,
            index: 0,
        };

        let content_item_id = ContentItemId::from(require_text(cursor.next("content_item_id")?)?);

        let parent = if descriptor.has_parent {
            let kind_text = require_text(cursor.next("parent_kind")?)?;
            let kind = ParentKind::parse(&kind_text).ok_or_else(|| {
                Error::Database(format!("unknown parent_kind value: {kind_text}"))
            })?;
            let id = ContentItemId::from(require_text(cursor.next("parent_id")?)?);
            Some(ParentRef { kind, id })
        } else {
            None
        };

        let mut payload = Vec::with_capacity(descriptor.payload_columns.len());
        for column in descriptor.payload_columns {
            payload.push(cursor.next(column.name)?.clone());
        }

        let meta = SyncMeta {
            correlation_id: optional_text(cursor.next("correlation_id")?).map(CorrelationId::from),
            is_edited: flag(cursor.next("is_edited")?)?,
            is_sync: flag(cursor.next("is_sync")?)?,
            is_force_sync: flag(cursor.next("is_force_sync")?)?,
            is_force_sync_success: flag(cursor.next("is_force_sync_success")?)?,
            not_in_offline: flag(cursor.next("not_in_offline")?)?,
            api_change_date_utc: optional_text(cursor.next("api_change_date_utc")?),
            created_utc: integer(cursor.next("created_utc")?)?,
            modified_utc: integer(cursor.next("modified_utc")?)?,
        };

        let sub_screen_edited = if descriptor.has_parent {
            false
        } else {
            flag(cursor.next("is_sub_screen_edited")?)?
        };

        Ok(Self {
            content_item_id,
            parent,
            payload,
            meta,
            sub_screen_edited,
        })
    }

    /// Payload value of a named column, if the descriptor carries it.
    pub fn payload_value(&self, descriptor: &EntityDescriptor, column: &str) -> Option<&Value> {
        descriptor
            .payload_index(column)
            .and_then(|index| self.payload.get(index))
    }

    /// Render the payload as a camelCase JSON object for outbound pushes.
    #[must_use]
    pub fn payload_json(&self, descriptor: &EntityDescriptor) -> serde_json::Value {
        payload_json(descriptor, &self.payload)
    }
}

/// Map a JSON wire value onto a storable column value.
#[must_use]
pub fn json_to_value(value: Option<&serde_json::Value>) -> Value {
    match value {
        None | Some(serde_json::Value::Null) => Value::Null,
        Some(serde_json::Value::Bool(b)) => Value::Integer(i64::from(*b)),
        Some(serde_json::Value::Number(n)) => n.as_i64().map_or_else(
            || Value::Real(n.as_f64().unwrap_or_default()),
            Value::Integer,
        ),
        Some(serde_json::Value::String(s)) => Value::Text(s.clone()),
        // Nested structures are stored in their serialized form.
        Some(other) => Value::Text(other.to_string()),
    }
}

/// Map a stored column value back onto a JSON wire value.
#[must_use]
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Real(r) => serde_json::Value::from(*r),
        Value::Text(t) => serde_json::Value::from(t.clone()),
        Value::Blob(_) => serde_json::Value::Null,
    }
}

fn payload_json(descriptor: &EntityDescriptor, payload: &[Value]) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    for (column, value) in descriptor.payload_columns.iter().zip(payload) {
        object.insert(camel_case(column.name), value_to_json(value));
    }
    serde_json::Value::Object(object)
}

struct RowCursor<'a> {
    table: &'static str,
    values: &'a [Value],
    index: usize,
}

impl<'a> RowCursor<'a> {
    fn next(&mut self, what: &str) -> Result<&'a Value> {
        let value = self
            .values
            .get(self.index)
            .ok_or_else(|| Error::Database(format!("{} row missing column {what}", self.table)))?;
        self.index += 1;
        Ok(value)
    }
}

fn require_text(value: &Value) -> Result<String> {
    match value {
        Value::Text(text) => Ok(text.clone()),
        other => Err(Error::Database(format!("expected TEXT, got {other:?}"))),
    }
}

fn optional_text(value: &Value) -> Option<String> {
    match value {
        Value::Text(text) => Some(text.clone()),
        _ => None,
    }
}

fn flag(value: &Value) -> Result<bool> {
    integer(value).map(|i| i != 0)
}

fn integer(value: &Value) -> Result<i64> {
    match value {
        Value::Integer(i) => Ok(*i),
        Value::Null => Ok(0),
        other => Err(Error::Database(format!("expected INTEGER, got {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;
    use serde_json::json;

    #[test]
    fn from_wire_extracts_payload_in_column_order() {
        let descriptor = EntityKind::AdminNote.descriptor();
        let parent = ParentRef::new(ParentKind::Case, "case-1");
        let element = json!({
            "contentItemId": "note-9",
            "noteText": "called applicant",
            "author": "mk",
            "apiChangeDateUtc": "2026-08-01T09:30:00Z",
            "correlationId": "corr-1"
        });

        let record = IncomingRecord::from_wire(descriptor, Some(parent), &element).unwrap();
        assert_eq!(record.content_item_id.as_str(), "note-9");
        assert_eq!(
            record.payload,
            vec![
                Value::Text("called applicant".into()),
                Value::Text("mk".into())
            ]
        );
        assert_eq!(
            record.api_change_date_utc.as_deref(),
            Some("2026-08-01T09:30:00Z")
        );
    }

    #[test]
    fn from_wire_tolerates_missing_payload_fields() {
        let descriptor = EntityKind::Contact.descriptor();
        let element = json!({ "contentItemId": "c-1", "fullName": "Dana Reyes" });

        let record = IncomingRecord::from_wire(descriptor, None, &element).unwrap();
        assert_eq!(record.payload[0], Value::Text("Dana Reyes".into()));
        assert_eq!(record.payload[1], Value::Null);
    }

    #[test]
    fn from_wire_rejects_elements_without_key() {
        let descriptor = EntityKind::Contact.descriptor();
        let element = json!({ "fullName": "No Id" });
        assert!(IncomingRecord::from_wire(descriptor, None, &element).is_err());
    }

    #[test]
    fn payload_json_round_trips_camel_case() {
        let descriptor = EntityKind::Payment.descriptor();
        let record = IncomingRecord::new(
            "pay-1",
            None,
            vec![
                Value::Integer(12_500),
                Value::Text("card".into()),
                Value::Text("settled".into()),
                Value::Null,
            ],
        );

        assert_eq!(
            record.payload_json(descriptor),
            json!({
                "amountCents": 12_500,
                "method": "card",
                "status": "settled",
                "receiptNumber": null
            })
        );
    }
}
