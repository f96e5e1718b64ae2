//! Local store adapter.
//!
//! Thin transactional wrapper over the libSQL connection. Everything above
//! this layer (reconciler, dirty-flag tracker, identity resolver,
//! orchestrator) talks to the store through `LocalStore` and
//! `StoreTransaction`; multi-statement invariant-preserving writes always run
//! inside one transaction.

use libsql::params::IntoParams;
use libsql::{Connection, Value};

use crate::entity::EntityDescriptor;
use crate::error::{Error, Result};
use crate::models::{ContentItemId, StoredRecord};

/// Shared sync-metadata columns, in canonical SELECT/INSERT order.
pub const META_COLUMNS: [&str; 9] = [
    "correlation_id",
    "is_edited",
    "is_sync",
    "is_force_sync",
    "is_force_sync_success",
    "not_in_offline",
    "api_change_date_utc",
    "created_utc",
    "modified_utc",
];

/// All columns of an entity table, in the canonical order understood by
/// `StoredRecord::from_row`.
pub fn record_columns(descriptor: &EntityDescriptor) -> Vec<&'static str> {
    let mut columns = vec!["content_item_id"];
    if descriptor.has_parent {
        columns.push("parent_kind");
        columns.push("parent_id");
    }
    columns.extend(descriptor.payload_columns.iter().map(|c| c.name));
    columns.extend(META_COLUMNS);
    if !descriptor.has_parent {
        columns.push("is_sub_screen_edited");
    }
    columns
}

/// Canonical single-record SELECT for an entity table.
pub fn record_select_sql(descriptor: &EntityDescriptor) -> String {
    format!(
        "SELECT {} FROM {} WHERE content_item_id = ?",
        record_columns(descriptor).join(", "),
        descriptor.table
    )
}

async fn collect_rows(mut rows: libsql::Rows) -> Result<Vec<Vec<Value>>> {
    let column_count = rows.column_count();
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        let mut values = Vec::with_capacity(column_count as usize);
        for index in 0..column_count {
            values.push(row.get_value(index)?);
        }
        out.push(values);
    }
    Ok(out)
}

/// Query/execute adapter over a borrowed connection.
pub struct LocalStore<'a> {
    conn: &'a Connection,
}

impl<'a> LocalStore<'a> {
    /// Create a new adapter over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Run a query and collect every row's column values.
    pub async fn run_query(&self, sql: &str, params: impl IntoParams) -> Result<Vec<Vec<Value>>> {
        collect_rows(self.conn.query(sql, params).await?).await
    }

    /// Run a query expected to yield at most one row.
    pub async fn query_row(
        &self,
        sql: &str,
        params: impl IntoParams,
    ) -> Result<Option<Vec<Value>>> {
        Ok(self.run_query(sql, params).await?.into_iter().next())
    }

    /// Execute a statement, returning the affected row count.
    pub async fn execute(&self, sql: &str, params: impl IntoParams) -> Result<u64> {
        Ok(self.conn.execute(sql, params).await?)
    }

    /// Open an explicit transaction.
    ///
    /// The caller must finish it with `commit` or `rollback`; every error
    /// path inside the transaction body rolls back before propagating.
    pub async fn begin(&self) -> Result<StoreTransaction<'a>> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        Ok(StoreTransaction {
            conn: self.conn,
            open: true,
        })
    }

    /// Fetch one stored record by its natural key.
    pub async fn fetch_record(
        &self,
        descriptor: &EntityDescriptor,
        id: &ContentItemId,
    ) -> Result<Option<StoredRecord>> {
        let sql = record_select_sql(descriptor);
        let row = self.query_row(&sql, [id.as_str()]).await?;
        row.map(|values| StoredRecord::from_row(descriptor, &values))
            .transpose()
    }

    /// Count rows in a table matching a WHERE clause.
    pub async fn count_where(
        &self,
        table: &str,
        where_clause: &str,
        params: impl IntoParams,
    ) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE {where_clause}");
        let row = self
            .query_row(&sql, params)
            .await?
            .ok_or_else(|| Error::Database("COUNT query returned no row".to_string()))?;
        match row.first() {
            Some(Value::Integer(count)) => Ok(*count),
            other => Err(Error::Database(format!("COUNT returned {other:?}"))),
        }
    }
}

/// An open transaction on the local store.
///
/// Statement failures do not roll back implicitly; callers roll back on their
/// error paths so the store returns to its pre-transaction state.
pub struct StoreTransaction<'a> {
    conn: &'a Connection,
    open: bool,
}

impl StoreTransaction<'_> {
    /// Execute a statement inside the transaction.
    pub async fn execute(&self, sql: &str, params: impl IntoParams) -> Result<u64> {
        Ok(self.conn.execute(sql, params).await?)
    }

    /// Run a query inside the transaction.
    pub async fn run_query(&self, sql: &str, params: impl IntoParams) -> Result<Vec<Vec<Value>>> {
        collect_rows(self.conn.query(sql, params).await?).await
    }

    /// Run a query expected to yield at most one row.
    pub async fn query_row(
        &self,
        sql: &str,
        params: impl IntoParams,
    ) -> Result<Option<Vec<Value>>> {
        Ok(self.run_query(sql, params).await?.into_iter().next())
    }

    /// Commit the transaction.
    pub async fn commit(mut self) -> Result<()> {
        self.open = false;
        if let Err(error) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(error.into());
        }
        Ok(())
    }

    /// Roll the transaction back, restoring the pre-transaction state.
    pub async fn rollback(mut self) -> Result<()> {
        self.open = false;
        self.conn.execute("ROLLBACK", ()).await?;
        Ok(())
    }
}

impl Drop for StoreTransaction<'_> {
    fn drop(&mut self) {
        if self.open {
            // A dropped-open transaction keeps the connection in BEGIN state.
            tracing::warn!("store transaction dropped without commit or rollback");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::entity::EntityKind;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn execute_and_query_round_trip() {
        let db = setup().await;
        let store = LocalStore::new(db.connection());

        let affected = store
            .execute(
                "INSERT INTO cases (content_item_id, created_utc, modified_utc) VALUES (?, ?, ?)",
                ("case-1", 1_i64, 1_i64),
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let rows = store
            .run_query("SELECT content_item_id FROM cases", ())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], Value::Text("case-1".into()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn committed_transaction_persists_all_statements() {
        let db = setup().await;
        let store = LocalStore::new(db.connection());

        let tx = store.begin().await.unwrap();
        tx.execute(
            "INSERT INTO cases (content_item_id, created_utc, modified_utc) VALUES ('case-1', 1, 1)",
            (),
        )
        .await
        .unwrap();
        tx.execute(
            "UPDATE cases SET is_sub_screen_edited = 1 WHERE content_item_id = 'case-1'",
            (),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let count = store
            .count_where("cases", "is_sub_screen_edited = 1", ())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_statement_rolls_back_to_pre_transaction_state() {
        let db = setup().await;
        let store = LocalStore::new(db.connection());

        store
            .execute(
                "INSERT INTO cases (content_item_id, created_utc, modified_utc) VALUES ('case-1', 1, 1)",
                (),
            )
            .await
            .unwrap();

        let tx = store.begin().await.unwrap();
        tx.execute(
            "UPDATE cases SET status = 'approved' WHERE content_item_id = 'case-1'",
            (),
        )
        .await
        .unwrap();
        // Second statement violates the primary key; the whole transaction
        // must be rolled back by the caller.
        let failed = tx
            .execute(
                "INSERT INTO cases (content_item_id, created_utc, modified_utc) VALUES ('case-1', 2, 2)",
                (),
            )
            .await;
        assert!(failed.is_err());
        tx.rollback().await.unwrap();

        let record = store
            .fetch_record(
                EntityKind::Case.descriptor(),
                &ContentItemId::from("case-1"),
            )
            .await
            .unwrap()
            .unwrap();
        // First statement's effect is gone too.
        assert_eq!(record.payload_value(EntityKind::Case.descriptor(), "status"), Some(&Value::Null));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_record_parses_metadata() {
        let db = setup().await;
        let store = LocalStore::new(db.connection());

        store
            .execute(
                "INSERT INTO admin_notes (content_item_id, parent_kind, parent_id, note_text, is_edited, created_utc, modified_utc)
                 VALUES ('note-1', 'case', 'case-1', 'hello', 1, 5, 6)",
                (),
            )
            .await
            .unwrap();

        let record = store
            .fetch_record(
                EntityKind::AdminNote.descriptor(),
                &ContentItemId::from("note-1"),
            )
            .await
            .unwrap()
            .unwrap();

        assert!(record.meta.is_edited);
        assert!(!record.meta.is_sync);
        assert_eq!(record.parent.as_ref().unwrap().id.as_str(), "case-1");
        assert_eq!(record.meta.created_utc, 5);
    }
}
