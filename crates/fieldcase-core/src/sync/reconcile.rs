//! Upsert reconciler.
//!
//! The one insert-or-conditionally-update algorithm shared by every entity
//! kind. Lookup by natural key, then insert, overwrite, or skip according to
//! the dirty-flag rules; a user edit rolls up to the owning parent row inside
//! the same transaction.

use libsql::Value;

use crate::db::{record_columns, LocalStore, StoreTransaction};
use crate::entity::EntityDescriptor;
use crate::error::{Error, Result};
use crate::models::{CorrelationId, IncomingRecord, ParentRef, SyncMeta};
use crate::util::unix_timestamp_millis;

use super::flags::{payload_overwrite_allowed, WriteSource};

/// What the reconciler did with an incoming record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No row existed; a full new row was inserted.
    Inserted,
    /// A clean row was overwritten with the server's payload.
    UpdatedFromServer,
    /// The row is locally edited; the server payload was discarded and only
    /// safe metadata refreshed.
    SkippedBecauseLocallyEdited,
    /// A user edit overwrote the row and marked it dirty.
    UpdatedLocalEdit,
}

/// Generic insert-or-conditionally-update over the local store.
pub struct Reconciler<'a> {
    store: &'a LocalStore<'a>,
}

struct ExistingRow {
    is_edited: bool,
    correlation_id: Option<CorrelationId>,
}

impl<'a> Reconciler<'a> {
    /// Create a new reconciler over the given store
    pub const fn new(store: &'a LocalStore<'a>) -> Self {
        Self { store }
    }

    /// Reconcile one incoming record into the local store.
    ///
    /// The whole operation (lookup, write, parent rollup) runs inside a
    /// single transaction; on any statement failure the store is rolled back
    /// to its pre-call state and the error propagates.
    pub async fn reconcile(
        &self,
        descriptor: &EntityDescriptor,
        incoming: IncomingRecord,
        source: WriteSource,
    ) -> Result<Outcome> {
        let tx = self.store.begin().await?;
        match self.apply(&tx, descriptor, incoming, source).await {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(error) => {
                tx.rollback().await.ok();
                Err(error)
            }
        }
    }

    async fn apply(
        &self,
        tx: &StoreTransaction<'_>,
        descriptor: &EntityDescriptor,
        incoming: IncomingRecord,
        source: WriteSource,
    ) -> Result<Outcome> {
        let existing = Self::lookup(tx, descriptor, &incoming).await?;

        match existing {
            None => {
                Self::insert(tx, descriptor, &incoming, source).await?;
                if source == WriteSource::UserEdit {
                    Self::roll_up_parent(tx, incoming.parent.as_ref()).await?;
                }
                Ok(Outcome::Inserted)
            }
            Some(row) => {
                if !payload_overwrite_allowed(row.is_edited, source) {
                    Self::refresh_safe_metadata(tx, descriptor, &incoming).await?;
                    return Ok(Outcome::SkippedBecauseLocallyEdited);
                }
                match source {
                    WriteSource::ServerFetch => {
                        Self::update_from_server(tx, descriptor, &incoming).await?;
                        Ok(Outcome::UpdatedFromServer)
                    }
                    WriteSource::UserEdit => {
                        Self::update_local_edit(tx, descriptor, &incoming, &row).await?;
                        Self::roll_up_parent(tx, incoming.parent.as_ref()).await?;
                        Ok(Outcome::UpdatedLocalEdit)
                    }
                }
            }
        }
    }

    async fn lookup(
        tx: &StoreTransaction<'_>,
        descriptor: &EntityDescriptor,
        incoming: &IncomingRecord,
    ) -> Result<Option<ExistingRow>> {
        let sql = format!(
            "SELECT is_edited, correlation_id FROM {} WHERE content_item_id = ?",
            descriptor.table
        );
        let row = tx
            .query_row(&sql, [incoming.content_item_id.as_str()])
            .await?;

        Ok(row.map(|values| ExistingRow {
            is_edited: matches!(values.first(), Some(Value::Integer(i)) if *i != 0),
            correlation_id: match values.get(1) {
                Some(Value::Text(text)) => Some(CorrelationId::from(text.clone())),
                _ => None,
            },
        }))
    }

    async fn insert(
        tx: &StoreTransaction<'_>,
        descriptor: &EntityDescriptor,
        incoming: &IncomingRecord,
        source: WriteSource,
    ) -> Result<()> {
        if incoming.payload.len() != descriptor.payload_columns.len() {
            return Err(Error::InvalidInput(format!(
                "{} payload has {} values, descriptor expects {}",
                descriptor.table,
                incoming.payload.len(),
                descriptor.payload_columns.len()
            )));
        }

        let now = unix_timestamp_millis();
        let mut meta = match source {
            WriteSource::ServerFetch => {
                SyncMeta::from_server(incoming.api_change_date_utc.clone(), now)
            }
            WriteSource::UserEdit => SyncMeta::offline_created(now),
        };
        if let Some(correlation) = &incoming.correlation_id {
            meta.correlation_id = Some(correlation.clone());
        }
        meta.not_in_offline = incoming.not_in_offline;

        let columns = record_columns(descriptor);
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            descriptor.table,
            columns.join(", "),
            placeholders
        );

        let mut params: Vec<Value> = Vec::with_capacity(columns.len());
        params.push(Value::Text(incoming.content_item_id.as_str().to_string()));
        if descriptor.has_parent {
            let parent = incoming.parent.as_ref().ok_or_else(|| {
                Error::InvalidInput(format!("{} record requires a parent", descriptor.table))
            })?;
            params.push(Value::Text(parent.kind.as_str().to_string()));
            params.push(Value::Text(parent.id.as_str().to_string()));
        }
        params.extend(incoming.payload.iter().cloned());
        params.push(
            meta.correlation_id
                .as_ref()
                .map_or(Value::Null, |c| Value::Text(c.as_str().to_string())),
        );
        params.push(Value::Integer(i64::from(meta.is_edited)));
        params.push(Value::Integer(i64::from(meta.is_sync)));
        params.push(Value::Integer(i64::from(meta.is_force_sync)));
        params.push(Value::Integer(i64::from(meta.is_force_sync_success)));
        params.push(Value::Integer(i64::from(meta.not_in_offline)));
        params.push(
            meta.api_change_date_utc
                .as_ref()
                .map_or(Value::Null, |d| Value::Text(d.clone())),
        );
        params.push(Value::Integer(meta.created_utc));
        params.push(Value::Integer(meta.modified_utc));
        if !descriptor.has_parent {
            params.push(Value::Integer(0)); // is_sub_screen_edited
        }

        tx.execute(&sql, params).await?;
        Ok(())
    }

    async fn update_from_server(
        tx: &StoreTransaction<'_>,
        descriptor: &EntityDescriptor,
        incoming: &IncomingRecord,
    ) -> Result<()> {
        let assignments: Vec<String> = descriptor
            .payload_columns
            .iter()
            .map(|c| format!("{} = ?", c.name))
            .collect();
        let sql = format!(
            "UPDATE {} SET {}, api_change_date_utc = ?, is_sync = 1, modified_utc = ? WHERE content_item_id = ?",
            descriptor.table,
            assignments.join(", ")
        );

        let mut params: Vec<Value> = incoming.payload.iter().cloned().collect();
        params.push(
            incoming
                .api_change_date_utc
                .as_ref()
                .map_or(Value::Null, |d| Value::Text(d.clone())),
        );
        params.push(Value::Integer(unix_timestamp_millis()));
        params.push(Value::Text(incoming.content_item_id.as_str().to_string()));

        tx.execute(&sql, params).await?;
        Ok(())
    }

    /// Locally-edited rows only take the server's change stamp; the edited
    /// payload is left untouched.
    async fn refresh_safe_metadata(
        tx: &StoreTransaction<'_>,
        descriptor: &EntityDescriptor,
        incoming: &IncomingRecord,
    ) -> Result<()> {
        let Some(api_change_date_utc) = &incoming.api_change_date_utc else {
            return Ok(());
        };
        let sql = format!(
            "UPDATE {} SET api_change_date_utc = ? WHERE content_item_id = ?",
            descriptor.table
        );
        tx.execute(
            &sql,
            (api_change_date_utc.clone(), incoming.content_item_id.as_str()),
        )
        .await?;
        Ok(())
    }

    async fn update_local_edit(
        tx: &StoreTransaction<'_>,
        descriptor: &EntityDescriptor,
        incoming: &IncomingRecord,
        existing: &ExistingRow,
    ) -> Result<()> {
        // A fresh mutation (row was clean) gets a fresh correlation token;
        // edits on an already-pending row keep the queued one so retries
        // stay deduplicatable.
        let correlation = if existing.is_edited {
            existing
                .correlation_id
                .clone()
                .unwrap_or_else(CorrelationId::new)
        } else {
            incoming
                .correlation_id
                .clone()
                .unwrap_or_else(CorrelationId::new)
        };

        let assignments: Vec<String> = descriptor
            .payload_columns
            .iter()
            .map(|c| format!("{} = ?", c.name))
            .collect();
        let sql = format!(
            "UPDATE {} SET {}, correlation_id = ?, is_edited = 1, is_sync = 0, modified_utc = ? WHERE content_item_id = ?",
            descriptor.table,
            assignments.join(", ")
        );

        let mut params: Vec<Value> = incoming.payload.iter().cloned().collect();
        params.push(Value::Text(correlation.as_str().to_string()));
        params.push(Value::Integer(unix_timestamp_millis()));
        params.push(Value::Text(incoming.content_item_id.as_str().to_string()));

        tx.execute(&sql, params).await?;
        Ok(())
    }

    /// Any local child write marks the owning parent's sub-screen flag, in
    /// the same transaction as the child row.
    async fn roll_up_parent(
        tx: &StoreTransaction<'_>,
        parent: Option<&ParentRef>,
    ) -> Result<()> {
        let Some(parent) = parent else {
            return Ok(());
        };
        let sql = format!(
            "UPDATE {} SET is_sub_screen_edited = 1 WHERE content_item_id = ?",
            parent.kind.table()
        );
        tx.execute(&sql, [parent.id.as_str()]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::entity::EntityKind;
    use crate::models::{ContentItemId, ParentKind};
    use pretty_assertions::assert_eq;

    fn case_payload(description: &str) -> Vec<Value> {
        vec![
            Value::Text("C-100".into()),
            Value::Text("building-permit".into()),
            Value::Text("open".into()),
            Value::Text(description.into()),
            Value::Text("Dana Reyes".into()),
            Value::Text("12 Hill Rd".into()),
        ]
    }

    async fn insert_case(store: &LocalStore<'_>, description: &str) -> Outcome {
        let reconciler = Reconciler::new(store);
        let mut incoming = IncomingRecord::new("case-1", None, case_payload(description));
        incoming.api_change_date_utc = Some("2026-08-01T10:00:00Z".into());
        reconciler
            .reconcile(
                EntityKind::Case.descriptor(),
                incoming,
                WriteSource::ServerFetch,
            )
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn repeated_fetches_keep_exactly_one_row() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LocalStore::new(db.connection());

        assert_eq!(insert_case(&store, "initial").await, Outcome::Inserted);
        for _ in 0..4 {
            assert_eq!(
                insert_case(&store, "refetched").await,
                Outcome::UpdatedFromServer
            );
        }

        let count = store.count_where("cases", "1 = 1", ()).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn server_fetch_never_clobbers_local_edit() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LocalStore::new(db.connection());
        let reconciler = Reconciler::new(&store);
        let descriptor = EntityKind::Case.descriptor();

        insert_case(&store, "server text").await;

        // User edits the description offline.
        let outcome = reconciler
            .reconcile(
                descriptor,
                IncomingRecord::new("case-1", None, case_payload("my field notes")),
                WriteSource::UserEdit,
            )
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::UpdatedLocalEdit);

        // A background refresh arrives with different server text.
        let mut refresh = IncomingRecord::new("case-1", None, case_payload("newer server text"));
        refresh.api_change_date_utc = Some("2026-08-02T08:00:00Z".into());
        let outcome = reconciler
            .reconcile(descriptor, refresh, WriteSource::ServerFetch)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::SkippedBecauseLocallyEdited);

        let record = store
            .fetch_record(descriptor, &ContentItemId::from("case-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            record.payload_value(descriptor, "description"),
            Some(&Value::Text("my field notes".into()))
        );
        assert!(record.meta.is_edited);
        // Safe metadata still refreshes.
        assert_eq!(
            record.meta.api_change_date_utc.as_deref(),
            Some("2026-08-02T08:00:00Z")
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn user_edit_marks_parent_sub_screen_edited() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LocalStore::new(db.connection());
        let reconciler = Reconciler::new(&store);

        insert_case(&store, "server text").await;

        let parent = ParentRef::new(ParentKind::Case, "case-1");
        let outcome = reconciler
            .reconcile(
                EntityKind::AdminNote.descriptor(),
                IncomingRecord::new(
                    ContentItemId::local(),
                    Some(parent),
                    vec![Value::Text("spoke to applicant".into()), Value::Null],
                ),
                WriteSource::UserEdit,
            )
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Inserted);

        let case = store
            .fetch_record(EntityKind::Case.descriptor(), &ContentItemId::from("case-1"))
            .await
            .unwrap()
            .unwrap();
        assert!(case.sub_screen_edited);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_insert_is_dirty_and_forced() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LocalStore::new(db.connection());
        let reconciler = Reconciler::new(&store);
        let descriptor = EntityKind::Contact.descriptor();

        let id = ContentItemId::local();
        reconciler
            .reconcile(
                descriptor,
                IncomingRecord::new(
                    id.clone(),
                    Some(ParentRef::new(ParentKind::License, "lic-1")),
                    vec![
                        Value::Text("Sam Ortiz".into()),
                        Value::Text("site-manager".into()),
                        Value::Null,
                        Value::Null,
                    ],
                ),
                WriteSource::UserEdit,
            )
            .await
            .unwrap();

        let record = store.fetch_record(descriptor, &id).await.unwrap().unwrap();
        assert!(record.meta.is_edited);
        assert!(record.meta.is_force_sync);
        assert!(!record.meta.is_force_sync_success);
        assert!(record.meta.correlation_id.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pending_mutation_keeps_its_correlation_id() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LocalStore::new(db.connection());
        let reconciler = Reconciler::new(&store);
        let descriptor = EntityKind::Case.descriptor();

        insert_case(&store, "server text").await;

        reconciler
            .reconcile(
                descriptor,
                IncomingRecord::new("case-1", None, case_payload("first edit")),
                WriteSource::UserEdit,
            )
            .await
            .unwrap();
        let first = store
            .fetch_record(descriptor, &ContentItemId::from("case-1"))
            .await
            .unwrap()
            .unwrap()
            .meta
            .correlation_id
            .unwrap();

        reconciler
            .reconcile(
                descriptor,
                IncomingRecord::new("case-1", None, case_payload("second edit")),
                WriteSource::UserEdit,
            )
            .await
            .unwrap();
        let second = store
            .fetch_record(descriptor, &ContentItemId::from("case-1"))
            .await
            .unwrap()
            .unwrap()
            .meta
            .correlation_id
            .unwrap();

        // Still the same pending mutation, so retries stay deduplicatable.
        assert_eq!(first, second);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn child_insert_without_parent_reference_fails_cleanly() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LocalStore::new(db.connection());
        let reconciler = Reconciler::new(&store);
        let descriptor = EntityKind::AdminNote.descriptor();

        let result = reconciler
            .reconcile(
                descriptor,
                IncomingRecord::new(
                    "note-1",
                    None,
                    vec![Value::Text("orphan".into()), Value::Null],
                ),
                WriteSource::ServerFetch,
            )
            .await;
        assert!(result.is_err());

        let count = store.count_where("admin_notes", "1 = 1", ()).await.unwrap();
        assert_eq!(count, 0);
    }
}
