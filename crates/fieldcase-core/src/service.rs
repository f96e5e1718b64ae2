//! Shared sync service wrapper used across clients.
//!
//! Owns the database handle and the sync collaborators; screen-level callers
//! (and the CLI) go through this facade instead of wiring the orchestrator
//! themselves.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{record_columns, Database, LocalStore};
use crate::entity::EntityKind;
use crate::error::Result;
use crate::models::{
    AdminNote, CaseSummary, ContentItemId, IncomingRecord, ParentKind, ParentRef, StoredRecord,
};
use crate::sync::{
    Outcome, PushReport, Reachability, RemoteApi, SyncOrchestrator, SyncReport, SyncResult,
};

/// Counters from one full sync cycle.
#[derive(Debug, Clone, Default)]
pub struct FullSyncSummary {
    pub pushed: Vec<PushReport>,
    pub fetched: Vec<SyncReport>,
    pub lookups_upserted: usize,
}

/// Thread-safe facade over the store, reconciler, and orchestrator.
#[derive(Clone)]
pub struct SyncService<A, R> {
    db: Arc<Mutex<Database>>,
    api: A,
    reachability: R,
}

impl<A: RemoteApi, R: Reachability> SyncService<A, R> {
    /// Open a service over a database file at the given path.
    pub async fn open_path(
        db_path: impl Into<PathBuf>,
        api: A,
        reachability: R,
    ) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            api,
            reachability,
        })
    }

    /// Open a service over an in-memory database (primarily for tests).
    pub async fn open_in_memory(api: A, reachability: R) -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            api,
            reachability,
        })
    }

    /// Replay queued offline writes, then refresh the Case and License
    /// mirrors and the lookup caches.
    ///
    /// Each stage is independently retryable; a failed fetch stage is logged
    /// and the remaining stages still run.
    pub async fn run_full_sync(&self) -> SyncResult<FullSyncSummary> {
        let db = self.db.lock().await;
        let store = LocalStore::new(db.connection());
        let orchestrator = SyncOrchestrator::new(&store, &self.api, &self.reachability);

        let mut summary = FullSyncSummary {
            pushed: orchestrator.push_all().await?,
            ..FullSyncSummary::default()
        };

        for parent_kind in [ParentKind::Case, ParentKind::License] {
            match orchestrator.sync_parents(parent_kind).await {
                Ok(report) => summary.fetched.push(report),
                Err(error) => {
                    tracing::warn!(kind = ?parent_kind, %error, "parent collection sync failed");
                }
            }
        }

        match orchestrator.sync_lookups().await {
            Ok(count) => summary.lookups_upserted = count,
            Err(error) => tracing::warn!(%error, "lookup refresh failed"),
        }

        Ok(summary)
    }

    /// Refresh every child collection of one Case/License.
    pub async fn sync_case_detail(&self, parent: &ParentRef) -> SyncResult<Vec<SyncReport>> {
        let db = self.db.lock().await;
        let store = LocalStore::new(db.connection());
        let orchestrator = SyncOrchestrator::new(&store, &self.api, &self.reachability);
        orchestrator.sync_children(parent).await
    }

    /// List locally mirrored Cases or Licenses, most recently touched first.
    pub async fn list_parents(&self, kind: ParentKind) -> Result<Vec<CaseSummary>> {
        let db = self.db.lock().await;
        let store = LocalStore::new(db.connection());
        let descriptor = EntityKind::of_parent(kind);

        let sql = format!(
            "SELECT {} FROM {} ORDER BY modified_utc DESC",
            record_columns(descriptor).join(", "),
            descriptor.table
        );
        let rows = store.run_query(&sql, ()).await?;
        rows.iter()
            .map(|values| {
                StoredRecord::from_row(descriptor, values)
                    .map(|record| CaseSummary::from_record(kind, &record))
            })
            .collect()
    }

    /// List the admin notes of one parent, newest first.
    pub async fn list_notes(&self, parent: &ParentRef) -> Result<Vec<AdminNote>> {
        let db = self.db.lock().await;
        let store = LocalStore::new(db.connection());
        let descriptor = EntityKind::AdminNote.descriptor();

        let sql = format!(
            "SELECT {} FROM {} WHERE parent_id = ? ORDER BY created_utc DESC",
            record_columns(descriptor).join(", "),
            descriptor.table
        );
        let rows = store.run_query(&sql, [parent.id.as_str()]).await?;
        rows.iter()
            .map(|values| {
                StoredRecord::from_row(descriptor, values)
                    .and_then(|record| AdminNote::from_record(&record))
            })
            .collect()
    }

    /// Capture an admin note against a Case/License, offline-safe.
    pub async fn add_note(
        &self,
        parent: ParentRef,
        note_text: impl Into<String>,
        author: Option<String>,
    ) -> Result<AdminNote> {
        let note = AdminNote::new_offline(parent.clone(), note_text, author);

        let db = self.db.lock().await;
        let store = LocalStore::new(db.connection());
        let orchestrator = SyncOrchestrator::new(&store, &self.api, &self.reachability);
        orchestrator
            .save_offline(EntityKind::AdminNote, &parent, note.to_incoming())
            .await?;
        Ok(note)
    }

    /// Store a user edit to a Case/License row.
    pub async fn save_parent(
        &self,
        kind: ParentKind,
        incoming: IncomingRecord,
    ) -> Result<Outcome> {
        let db = self.db.lock().await;
        let store = LocalStore::new(db.connection());
        let orchestrator = SyncOrchestrator::new(&store, &self.api, &self.reachability);
        orchestrator.save_parent_offline(kind, incoming).await
    }

    /// Fetch one mirrored record by kind and id.
    pub async fn get_record(
        &self,
        kind: EntityKind,
        id: &ContentItemId,
    ) -> Result<Option<StoredRecord>> {
        let db = self.db.lock().await;
        let store = LocalStore::new(db.connection());
        store.fetch_record(kind.descriptor(), id).await
    }

    /// Per-table counts of records still awaiting reconciliation.
    pub async fn pending_counts(&self) -> Result<Vec<(&'static str, i64)>> {
        const PENDING: &str =
            "is_edited = 1 OR (is_force_sync = 1 AND is_force_sync_success = 0)";

        let db = self.db.lock().await;
        let store = LocalStore::new(db.connection());

        let mut counts = Vec::new();
        for kind in [EntityKind::Case, EntityKind::License]
            .into_iter()
            .chain(EntityKind::CHILD_KINDS)
        {
            let table = kind.descriptor().table;
            let count = store.count_where(table, PENDING, ()).await?;
            if count > 0 {
                counts.push((table, count));
            }
        }
        Ok(counts)
    }

    /// Delete fully reconciled records. Returns the deleted row count.
    pub async fn prune(&self) -> Result<u64> {
        let db = self.db.lock().await;
        let store = LocalStore::new(db.connection());
        let orchestrator = SyncOrchestrator::new(&store, &self.api, &self.reachability);
        orchestrator.prune_completed().await
    }
}
