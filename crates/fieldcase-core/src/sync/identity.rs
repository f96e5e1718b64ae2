//! Correlation/identity resolver.
//!
//! Offline-created records carry a local-only primary key until the server
//! assigns its own. Promotion rewrites the local key and every child row
//! referencing it, atomically and idempotently: a retried confirmation for an
//! id that was already promoted is a benign no-op.

use crate::db::LocalStore;
use crate::entity::{EntityDescriptor, EntityKind};
use crate::error::Result;
use crate::models::{ContentItemId, ParentKind};

/// Result of a promotion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    /// The local row (and its children, for parents) now carries the server
    /// id.
    Promoted,
    /// The old id no longer exists locally; a prior attempt already promoted
    /// it.
    AlreadyPromoted,
}

/// Rewrites local-only primary keys once the server assigns durable ids.
pub struct IdentityResolver<'a> {
    store: &'a LocalStore<'a>,
}

impl<'a> IdentityResolver<'a> {
    /// Create a new resolver over the given store
    pub const fn new(store: &'a LocalStore<'a>) -> Self {
        Self { store }
    }

    /// Promote a parent Case/License row from its local id to the
    /// server-assigned id, rewriting all child foreign keys in the same
    /// transaction.
    ///
    /// Children are rewritten before the parent key itself; if any statement
    /// fails the whole promotion rolls back and the record remains
    /// addressable under its old id until a retry succeeds.
    pub async fn promote_local_id(
        &self,
        parent_kind: ParentKind,
        old_id: &ContentItemId,
        new_id: &ContentItemId,
    ) -> Result<Promotion> {
        if old_id == new_id {
            return Ok(Promotion::AlreadyPromoted);
        }

        let tx = self.store.begin().await?;

        let exists_sql = format!(
            "SELECT 1 FROM {} WHERE content_item_id = ?",
            parent_kind.table()
        );
        let exists = match tx.query_row(&exists_sql, [old_id.as_str()]).await {
            Ok(row) => row.is_some(),
            Err(error) => {
                tx.rollback().await.ok();
                return Err(error);
            }
        };
        if !exists {
            tx.rollback().await.ok();
            tracing::debug!(
                old_id = %old_id,
                "promotion target no longer present; treating as already promoted"
            );
            return Ok(Promotion::AlreadyPromoted);
        }

        for kind in EntityKind::CHILD_KINDS {
            let sql = format!(
                "UPDATE {} SET parent_id = ? WHERE parent_id = ?",
                kind.descriptor().table
            );
            if let Err(error) = tx.execute(&sql, (new_id.as_str(), old_id.as_str())).await {
                tx.rollback().await.ok();
                return Err(error);
            }
        }

        let parent_sql = format!(
            "UPDATE {} SET content_item_id = ? WHERE content_item_id = ?",
            parent_kind.table()
        );
        if let Err(error) = tx
            .execute(&parent_sql, (new_id.as_str(), old_id.as_str()))
            .await
        {
            tx.rollback().await.ok();
            return Err(error);
        }

        tx.commit().await?;
        tracing::debug!(old_id = %old_id, new_id = %new_id, "promoted local parent id");
        Ok(Promotion::Promoted)
    }

    /// Promote a child record's own key. Nothing references child keys, so
    /// this is a single idempotent rewrite.
    pub async fn promote_child_id(
        &self,
        descriptor: &EntityDescriptor,
        old_id: &ContentItemId,
        new_id: &ContentItemId,
    ) -> Result<Promotion> {
        if old_id == new_id {
            return Ok(Promotion::AlreadyPromoted);
        }

        let sql = format!(
            "UPDATE {} SET content_item_id = ? WHERE content_item_id = ?",
            descriptor.table
        );
        let affected = self
            .store
            .execute(&sql, (new_id.as_str(), old_id.as_str()))
            .await?;

        if affected == 0 {
            Ok(Promotion::AlreadyPromoted)
        } else {
            Ok(Promotion::Promoted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn seed_parent_with_children(store: &LocalStore<'_>, parent_id: &str) {
        store
            .execute(
                "INSERT INTO cases (content_item_id, created_utc, modified_utc) VALUES (?, 1, 1)",
                [parent_id],
            )
            .await
            .unwrap();
        store
            .execute(
                "INSERT INTO admin_notes (content_item_id, parent_kind, parent_id, note_text, created_utc, modified_utc)
                 VALUES ('note-1', 'case', ?, 'n', 1, 1)",
                [parent_id],
            )
            .await
            .unwrap();
        store
            .execute(
                "INSERT INTO contacts (content_item_id, parent_kind, parent_id, full_name, created_utc, modified_utc)
                 VALUES ('contact-1', 'case', ?, 'Dana', 1, 1)",
                [parent_id],
            )
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn promotion_rewrites_parent_and_children() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LocalStore::new(db.connection());
        let resolver = IdentityResolver::new(&store);

        let old_id = ContentItemId::local();
        seed_parent_with_children(&store, old_id.as_str()).await;

        let new_id = ContentItemId::server("case-900");
        let outcome = resolver
            .promote_local_id(ParentKind::Case, &old_id, &new_id)
            .await
            .unwrap();
        assert_eq!(outcome, Promotion::Promoted);

        let parent_count = store
            .count_where("cases", "content_item_id = ?", [new_id.as_str()])
            .await
            .unwrap();
        assert_eq!(parent_count, 1);

        for table in ["admin_notes", "contacts"] {
            let rewritten = store
                .count_where(table, "parent_id = ?", [new_id.as_str()])
                .await
                .unwrap();
            assert_eq!(rewritten, 1, "{table} child not rekeyed");
            let stale = store
                .count_where(table, "parent_id = ?", [old_id.as_str()])
                .await
                .unwrap();
            assert_eq!(stale, 0);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn promotion_is_idempotent() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LocalStore::new(db.connection());
        let resolver = IdentityResolver::new(&store);

        let old_id = ContentItemId::local();
        seed_parent_with_children(&store, old_id.as_str()).await;

        let new_id = ContentItemId::server("case-901");
        assert_eq!(
            resolver
                .promote_local_id(ParentKind::Case, &old_id, &new_id)
                .await
                .unwrap(),
            Promotion::Promoted
        );
        // A retried confirmation must be a benign no-op.
        assert_eq!(
            resolver
                .promote_local_id(ParentKind::Case, &old_id, &new_id)
                .await
                .unwrap(),
            Promotion::AlreadyPromoted
        );

        let parent_count = store
            .count_where("cases", "content_item_id = ?", [new_id.as_str()])
            .await
            .unwrap();
        assert_eq!(parent_count, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_promotion_rolls_back_child_rewrites() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LocalStore::new(db.connection());
        let resolver = IdentityResolver::new(&store);

        let old_id = ContentItemId::local();
        seed_parent_with_children(&store, old_id.as_str()).await;

        // Occupying the target id makes the final parent rewrite fail after
        // the children were already rewritten inside the transaction.
        store
            .execute(
                "INSERT INTO cases (content_item_id, created_utc, modified_utc) VALUES ('case-902', 1, 1)",
                (),
            )
            .await
            .unwrap();

        let result = resolver
            .promote_local_id(ParentKind::Case, &old_id, &ContentItemId::server("case-902"))
            .await;
        assert!(result.is_err());

        // The child rewrites were rolled back with the failed parent rewrite.
        for table in ["admin_notes", "contacts"] {
            let still_old = store
                .count_where(table, "parent_id = ?", [old_id.as_str()])
                .await
                .unwrap();
            assert_eq!(still_old, 1, "{table} child rewrite was not rolled back");
        }
        let parent_under_old = store
            .count_where("cases", "content_item_id = ?", [old_id.as_str()])
            .await
            .unwrap();
        assert_eq!(parent_under_old, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn child_promotion_is_idempotent() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LocalStore::new(db.connection());
        let resolver = IdentityResolver::new(&store);

        let old_id = ContentItemId::local();
        store
            .execute(
                "INSERT INTO payments (content_item_id, parent_kind, parent_id, amount_cents, created_utc, modified_utc)
                 VALUES (?, 'case', 'case-1', 5000, 1, 1)",
                [old_id.as_str()],
            )
            .await
            .unwrap();

        let descriptor = EntityKind::Payment.descriptor();
        let new_id = ContentItemId::server("pay-31");
        assert_eq!(
            resolver
                .promote_child_id(descriptor, &old_id, &new_id)
                .await
                .unwrap(),
            Promotion::Promoted
        );
        assert_eq!(
            resolver
                .promote_child_id(descriptor, &old_id, &new_id)
                .await
                .unwrap(),
            Promotion::AlreadyPromoted
        );
    }
}
