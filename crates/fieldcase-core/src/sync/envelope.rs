//! Outbound mutation envelope and server acknowledgement shapes.

use serde::{Deserialize, Serialize};

use crate::entity::EntityDescriptor;
use crate::error::{Error, Result};
use crate::models::StoredRecord;
use libsql::Value;

/// The `SyncModel` envelope wrapped around every outbound mutation so the
/// server can perform its own idempotent-upsert matching on the correlation
/// id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEnvelope {
    pub is_offline_sync: bool,
    pub is_force_sync: bool,
    pub api_change_date_utc: Option<String>,
    pub correlation_id: String,
    pub sync_content_item_id: String,
    pub sync_document_id: Option<String>,
    /// The record's domain payload, camelCase keyed.
    pub payload: serde_json::Value,
}

impl SyncEnvelope {
    /// Build the envelope for a pending stored record.
    ///
    /// Fails when the record carries no correlation token; the reconciler
    /// assigns one to every row it marks dirty.
    pub fn for_record(descriptor: &EntityDescriptor, record: &StoredRecord) -> Result<Self> {
        let correlation_id = record
            .meta
            .correlation_id
            .as_ref()
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "{} {} is pending without a correlation id",
                    descriptor.table, record.content_item_id
                ))
            })?
            .as_str()
            .to_string();

        let sync_document_id = match record.payload_value(descriptor, "document_id") {
            Some(Value::Text(id)) => Some(id.clone()),
            _ => None,
        };

        Ok(Self {
            is_offline_sync: record.meta.is_edited,
            is_force_sync: record.meta.is_force_sync && !record.meta.is_force_sync_success,
            api_change_date_utc: record.meta.api_change_date_utc.clone(),
            correlation_id,
            sync_content_item_id: record.content_item_id.as_str().to_string(),
            sync_document_id,
            payload: record.payload_json(descriptor),
        })
    }
}

/// Server acknowledgement of one pushed mutation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAck {
    /// The server recognized (or deduplicated) the mutation.
    pub accepted: bool,
    /// Server-assigned id, present when a forced record got its durable id.
    #[serde(default)]
    pub content_item_id: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SyncAck {
    /// Parse the acknowledgement out of a 2xx response body.
    pub fn from_body(body: &serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(body.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_serializes_camel_case() {
        let envelope = SyncEnvelope {
            is_offline_sync: true,
            is_force_sync: false,
            api_change_date_utc: None,
            correlation_id: "corr-1".into(),
            sync_content_item_id: "case-1".into(),
            sync_document_id: None,
            payload: json!({"status": "open"}),
        };

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["isOfflineSync"], json!(true));
        assert_eq!(value["correlationId"], json!("corr-1"));
        assert_eq!(value["syncContentItemId"], json!("case-1"));
    }

    #[test]
    fn ack_parses_minimal_body() {
        let ack = SyncAck::from_body(&json!({ "accepted": true })).unwrap();
        assert!(ack.accepted);
        assert_eq!(ack.content_item_id, None);
    }

    #[test]
    fn ack_parses_assigned_id() {
        let ack = SyncAck::from_body(&json!({
            "accepted": true,
            "contentItemId": "case-900",
            "correlationId": "corr-7"
        }))
        .unwrap();
        assert_eq!(ack.content_item_id.as_deref(), Some("case-900"));
    }

    #[test]
    fn ack_rejects_malformed_body() {
        assert!(SyncAck::from_body(&json!({ "accepted": "yes" })).is_err());
    }
}
