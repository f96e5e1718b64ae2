//! Sync orchestrator.
//!
//! Per-entity-kind sync routines driving the reconciler: inbound fetches
//! when the reachability oracle reports connected, offline saves with parent
//! stub materialization, and the outbound push replaying queued mutations.
//!
//! Each kind's pass moves `Idle -> Fetching -> Reconciling -> Idle`, or
//! `Idle -> Fetching -> Failed -> Idle` on a transport error. Element-level
//! failures are isolated and counted; pass-level failures surface as typed
//! `SyncError`s. Multi-kind passes are fire-and-report: one kind's failure
//! never blocks the others.

use libsql::Value;

use crate::db::{record_columns, LocalStore};
use crate::entity::{EntityDescriptor, EntityKind};
use crate::error::{Error, Result};
use crate::models::{
    ContentItemId, IncomingRecord, LookupEntry, LookupKind, ParentKind, ParentRef, StoredRecord,
};
use crate::util::unix_timestamp_millis;

use super::envelope::{SyncAck, SyncEnvelope};
use super::flags::{DirtyFlagTracker, WriteSource};
use super::identity::IdentityResolver;
use super::reconcile::{Outcome, Reconciler};
use super::remote::{Reachability, RemoteApi, SyncError, SyncResult};

/// Phase of one entity kind's sync pass, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncPhase {
    Fetching,
    Reconciling,
    Failed,
}

/// Counters for one inbound entity-kind pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub entity: &'static str,
    pub fetched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped_edited: usize,
    pub failed: usize,
    /// Set when the pass itself failed before reconciling (fire-and-report
    /// wrappers convert the typed error into this marker).
    pub pass_failed: bool,
}

impl SyncReport {
    fn new(entity: &'static str) -> Self {
        Self {
            entity,
            fetched: 0,
            inserted: 0,
            updated: 0,
            skipped_edited: 0,
            failed: 0,
            pass_failed: false,
        }
    }

    fn failed_pass(entity: &'static str) -> Self {
        let mut report = Self::new(entity);
        report.pass_failed = true;
        report
    }
}

/// Counters for one outbound push pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReport {
    pub entity: &'static str,
    pub attempted: usize,
    pub acknowledged: usize,
    pub promoted: usize,
    pub failed: usize,
}

impl PushReport {
    fn new(entity: &'static str) -> Self {
        Self {
            entity,
            attempted: 0,
            acknowledged: 0,
            promoted: 0,
            failed: 0,
        }
    }
}

/// Top-level per-entity-kind sync routines.
pub struct SyncOrchestrator<'a, A, R> {
    store: &'a LocalStore<'a>,
    api: &'a A,
    reachability: &'a R,
}

impl<'a, A: RemoteApi, R: Reachability> SyncOrchestrator<'a, A, R> {
    /// Create an orchestrator over the given collaborators
    pub const fn new(store: &'a LocalStore<'a>, api: &'a A, reachability: &'a R) -> Self {
        Self {
            store,
            api,
            reachability,
        }
    }

    fn require_online(&self) -> SyncResult<()> {
        if self.reachability.is_online() {
            Ok(())
        } else {
            Err(SyncError::Offline)
        }
    }

    /// Fetch and reconcile the top-level Case or License collection.
    pub async fn sync_parents(&self, parent_kind: ParentKind) -> SyncResult<SyncReport> {
        self.require_online()?;
        let descriptor = EntityKind::of_parent(parent_kind);
        self.run_inbound_pass(descriptor, parent_kind.path_segment().to_string(), None)
            .await
    }

    /// Fetch and reconcile one child collection of the given parent.
    pub async fn sync_child_kind(
        &self,
        parent: &ParentRef,
        kind: EntityKind,
    ) -> SyncResult<SyncReport> {
        self.require_online()?;
        let descriptor = kind.descriptor();
        let path = format!(
            "{}/{}/{}",
            parent.kind.path_segment(),
            parent.id,
            descriptor.path_segment
        );
        self.run_inbound_pass(descriptor, path, Some(parent.clone()))
            .await
    }

    /// Sync every child collection of one parent, fire-and-report: a failed
    /// kind is logged and marked in its report, the remaining kinds still
    /// run.
    pub async fn sync_children(&self, parent: &ParentRef) -> SyncResult<Vec<SyncReport>> {
        self.require_online()?;

        let mut reports = Vec::with_capacity(EntityKind::CHILD_KINDS.len());
        for kind in EntityKind::CHILD_KINDS {
            match self.sync_child_kind(parent, kind).await {
                Ok(report) => reports.push(report),
                Err(error) => {
                    tracing::warn!(
                        entity = kind.descriptor().table,
                        parent = %parent.id,
                        %error,
                        "child collection sync pass failed"
                    );
                    reports.push(SyncReport::failed_pass(kind.descriptor().table));
                }
            }
        }
        Ok(reports)
    }

    async fn run_inbound_pass(
        &self,
        descriptor: &'static EntityDescriptor,
        path: String,
        parent: Option<ParentRef>,
    ) -> SyncResult<SyncReport> {
        tracing::debug!(entity = descriptor.table, phase = ?SyncPhase::Fetching);
        let response = match self.api.get(&path).await {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!(entity = descriptor.table, phase = ?SyncPhase::Failed);
                return Err(error);
            }
        };
        let elements = list_elements(&response.body)?;

        tracing::debug!(entity = descriptor.table, phase = ?SyncPhase::Reconciling);
        let mut report = SyncReport::new(descriptor.table);
        report.fetched = elements.len();

        let reconciler = Reconciler::new(self.store);
        for element in &elements {
            match self
                .reconcile_element(&reconciler, descriptor, parent.clone(), element)
                .await
            {
                Ok(Outcome::Inserted) => report.inserted += 1,
                Ok(Outcome::UpdatedFromServer) => report.updated += 1,
                Ok(Outcome::SkippedBecauseLocallyEdited) => report.skipped_edited += 1,
                Ok(Outcome::UpdatedLocalEdit) => {}
                Err(error) => {
                    // One bad element must not abort the batch.
                    report.failed += 1;
                    tracing::warn!(entity = descriptor.table, %error, "element failed to reconcile");
                }
            }
        }

        tracing::info!(
            entity = report.entity,
            fetched = report.fetched,
            inserted = report.inserted,
            updated = report.updated,
            skipped_edited = report.skipped_edited,
            failed = report.failed,
            "inbound sync pass finished"
        );
        Ok(report)
    }

    async fn reconcile_element(
        &self,
        reconciler: &Reconciler<'_>,
        descriptor: &EntityDescriptor,
        parent: Option<ParentRef>,
        element: &serde_json::Value,
    ) -> Result<Outcome> {
        let incoming = IncomingRecord::from_wire(descriptor, parent, element)?;
        let key = incoming.content_item_id.clone();
        reconciler
            .reconcile(descriptor, incoming, WriteSource::ServerFetch)
            .await
            .map_err(|error| Error::reconciliation(descriptor.table, key.as_str(), error))
    }

    /// Refresh the lookup/dropdown caches. Reference data from the server's
    /// point of view, so plain upserts without dirty-flag tracking;
    /// fire-and-report per collection.
    pub async fn sync_lookups(&self) -> SyncResult<usize> {
        self.require_online()?;

        let mut upserted = 0;
        for kind in LookupKind::ALL {
            match self.refresh_lookup(kind).await {
                Ok(count) => upserted += count,
                Err(error) => {
                    tracing::warn!(lookup = kind.table(), %error, "lookup refresh failed");
                }
            }
        }
        Ok(upserted)
    }

    async fn refresh_lookup(&self, kind: LookupKind) -> SyncResult<usize> {
        let response = self.api.get(kind.path_segment()).await?;
        let elements = list_elements(&response.body)?;
        let now = unix_timestamp_millis();

        let mut count = 0;
        for element in &elements {
            let entry: LookupEntry = serde_json::from_value(element.clone())
                .map_err(|e| SyncError::InvalidPayload(e.to_string()))?;
            let sql = format!(
                "INSERT OR REPLACE INTO {} (key, label, fetched_utc) VALUES (?, ?, ?)",
                kind.table()
            );
            self.store
                .execute(&sql, (entry.key.as_str(), entry.label.as_str(), now))
                .await
                .map_err(SyncError::Store)?;
            count += 1;
        }
        Ok(count)
    }

    /// Store a user edit to a child record, materializing the parent stub
    /// first when the Case/License is not locally present.
    ///
    /// Purely local: works identically whatever the oracle reports.
    pub async fn save_offline(
        &self,
        kind: EntityKind,
        parent: &ParentRef,
        mut incoming: IncomingRecord,
    ) -> Result<Outcome> {
        let descriptor = kind.descriptor();
        if !descriptor.has_parent {
            return Err(Error::InvalidInput(format!(
                "{} is not a child entity",
                descriptor.table
            )));
        }

        if self.materialize_parent_stub(parent).await? {
            incoming = incoming.with_not_in_offline();
        }
        incoming.parent = Some(parent.clone());

        Reconciler::new(self.store)
            .reconcile(descriptor, incoming, WriteSource::UserEdit)
            .await
    }

    /// Store a user edit to a Case/License row itself.
    pub async fn save_parent_offline(
        &self,
        parent_kind: ParentKind,
        incoming: IncomingRecord,
    ) -> Result<Outcome> {
        Reconciler::new(self.store)
            .reconcile(
                EntityKind::of_parent(parent_kind),
                incoming,
                WriteSource::UserEdit,
            )
            .await
    }

    /// Insert a minimal offline parent row so child writes satisfy the
    /// ownership invariant. Returns whether a stub was created.
    async fn materialize_parent_stub(&self, parent: &ParentRef) -> Result<bool> {
        let existing = self
            .store
            .count_where(
                parent.kind.table(),
                "content_item_id = ?",
                [parent.id.as_str()],
            )
            .await?;
        if existing > 0 {
            return Ok(false);
        }

        let descriptor = EntityKind::of_parent(parent.kind);
        let stub = IncomingRecord::new(
            parent.id.clone(),
            None,
            vec![Value::Null; descriptor.payload_columns.len()],
        );
        Reconciler::new(self.store)
            .reconcile(descriptor, stub, WriteSource::UserEdit)
            .await?;
        tracing::info!(parent = %parent.id, kind = ?parent.kind, "materialized offline parent stub");
        Ok(true)
    }

    /// Push every pending mutation of one entity kind.
    ///
    /// Pending means `is_edited = 1` or a forced record whose push has not
    /// succeeded yet. Per-record failures are isolated; the record keeps its
    /// flags and is retried on the next reconnect.
    pub async fn push_pending_kind(&self, kind: EntityKind) -> SyncResult<PushReport> {
        self.require_online()?;
        let descriptor = kind.descriptor();

        let sql = format!(
            "SELECT {} FROM {} WHERE is_edited = 1 OR (is_force_sync = 1 AND is_force_sync_success = 0)",
            record_columns(descriptor).join(", "),
            descriptor.table
        );
        let rows = self.store.run_query(&sql, ()).await.map_err(SyncError::Store)?;

        let mut report = PushReport::new(descriptor.table);
        for values in rows {
            let record = match StoredRecord::from_row(descriptor, &values) {
                Ok(record) => record,
                Err(error) => {
                    report.failed += 1;
                    tracing::warn!(entity = descriptor.table, %error, "pending row unreadable");
                    continue;
                }
            };
            report.attempted += 1;
            let id = record.content_item_id.clone();
            match self.push_record(descriptor, record).await {
                Ok(promoted) => {
                    report.acknowledged += 1;
                    if promoted {
                        report.promoted += 1;
                    }
                }
                Err(error) => {
                    // The record stays dirty/forced and is retried later.
                    report.failed += 1;
                    tracing::warn!(entity = descriptor.table, record = %id, %error, "push failed");
                }
            }
        }

        tracing::info!(
            entity = report.entity,
            attempted = report.attempted,
            acknowledged = report.acknowledged,
            promoted = report.promoted,
            failed = report.failed,
            "outbound push pass finished"
        );
        Ok(report)
    }

    /// Push one pending record; returns whether a local id was promoted.
    async fn push_record(
        &self,
        descriptor: &EntityDescriptor,
        record: StoredRecord,
    ) -> SyncResult<bool> {
        let envelope = SyncEnvelope::for_record(descriptor, &record).map_err(SyncError::Store)?;
        let body = serde_json::to_value(&envelope)
            .map_err(|e| SyncError::InvalidPayload(e.to_string()))?;
        let path = format!("sync/{}", descriptor.path_segment);

        let response = self.api.post_with_token(&path, &body).await?;
        let ack = SyncAck::from_body(&response.body)
            .map_err(|e| SyncError::InvalidPayload(e.to_string()))?;
        if !ack.accepted {
            return Err(SyncError::Api(format!(
                "mutation rejected: {}",
                ack.message.unwrap_or_else(|| "no reason given".to_string())
            )));
        }

        // Promote before confirming so the flags land on the durable id.
        let mut current_id = record.content_item_id.clone();
        let mut promoted = false;
        if let Some(server_id) = &ack.content_item_id {
            let server_id = ContentItemId::server(server_id.clone());
            if server_id != current_id {
                let resolver = IdentityResolver::new(self.store);
                match descriptor.kind.as_parent() {
                    Some(parent_kind) => {
                        resolver
                            .promote_local_id(parent_kind, &current_id, &server_id)
                            .await
                            .map_err(SyncError::Store)?;
                    }
                    None => {
                        resolver
                            .promote_child_id(descriptor, &current_id, &server_id)
                            .await
                            .map_err(SyncError::Store)?;
                    }
                }
                current_id = server_id;
                promoted = true;
            }
        }

        DirtyFlagTracker::new(self.store)
            .confirm_acknowledged(descriptor, &current_id)
            .await
            .map_err(SyncError::Store)?;
        Ok(promoted)
    }

    /// Push every entity kind's pending mutations, fire-and-report, then
    /// clear sub-screen rollup flags on parents whose children all
    /// reconciled.
    pub async fn push_all(&self) -> SyncResult<Vec<PushReport>> {
        self.require_online()?;

        let mut reports = Vec::new();
        for kind in [EntityKind::Case, EntityKind::License]
            .into_iter()
            .chain(EntityKind::CHILD_KINDS)
        {
            match self.push_pending_kind(kind).await {
                Ok(report) => reports.push(report),
                Err(error) => {
                    tracing::warn!(
                        entity = kind.descriptor().table,
                        %error,
                        "push pass failed"
                    );
                }
            }
        }

        self.clear_clean_parent_rollups().await.map_err(SyncError::Store)?;
        Ok(reports)
    }

    /// Clear `is_sub_screen_edited` on every parent with no remaining dirty
    /// children (the orchestrator owns this transition, not child writes).
    async fn clear_clean_parent_rollups(&self) -> Result<()> {
        let tracker = DirtyFlagTracker::new(self.store);
        for parent_kind in [ParentKind::Case, ParentKind::License] {
            let sql = format!(
                "SELECT content_item_id FROM {} WHERE is_sub_screen_edited = 1",
                parent_kind.table()
            );
            let rows = self.store.run_query(&sql, ()).await?;
            for values in rows {
                if let Some(Value::Text(id)) = values.first() {
                    let parent = ParentRef::new(parent_kind, id.as_str());
                    tracker.clear_parent_rollup_if_clean(&parent).await?;
                }
            }
        }
        Ok(())
    }

    /// Delete records whose state is fully reconciled: not edited, synced
    /// (or force-synced), and not referenced as the parent of an unsynced
    /// child. Explicit maintenance operation; returns deleted row count.
    pub async fn prune_completed(&self) -> Result<u64> {
        const PRUNABLE: &str =
            "is_edited = 0 AND is_sync = 1 AND (is_force_sync = 0 OR is_force_sync_success = 1)";

        let mut deleted = 0;
        for kind in EntityKind::CHILD_KINDS {
            let sql = format!("DELETE FROM {} WHERE {PRUNABLE}", kind.descriptor().table);
            deleted += self.store.execute(&sql, ()).await?;
        }

        // Parents survive while any child row still references them.
        let child_guards: Vec<String> = EntityKind::CHILD_KINDS
            .iter()
            .map(|kind| {
                format!(
                    "NOT EXISTS (SELECT 1 FROM {child} WHERE {child}.parent_id = {{parent}}.content_item_id)",
                    child = kind.descriptor().table
                )
            })
            .collect();
        for parent_kind in [ParentKind::Case, ParentKind::License] {
            let guards = child_guards
                .join(" AND ")
                .replace("{parent}", parent_kind.table());
            let sql = format!(
                "DELETE FROM {} WHERE {PRUNABLE} AND {guards}",
                parent_kind.table()
            );
            deleted += self.store.execute(&sql, ()).await?;
        }

        if deleted > 0 {
            tracing::info!(deleted, "pruned fully reconciled records");
        }
        Ok(deleted)
    }
}

/// Accept either a bare JSON array or an `{"items": [...]}` wrapper.
fn list_elements(body: &serde_json::Value) -> SyncResult<Vec<serde_json::Value>> {
    match body {
        serde_json::Value::Array(items) => Ok(items.clone()),
        serde_json::Value::Object(object) => match object.get("items") {
            Some(serde_json::Value::Array(items)) => Ok(items.clone()),
            _ => Err(SyncError::InvalidPayload(
                "expected a list or an items wrapper".to_string(),
            )),
        },
        _ => Err(SyncError::InvalidPayload(
            "expected a list response".to_string(),
        )),
    }
}
