//! Dirty-flag state machine.
//!
//! Decides, for any proposed write, whether the locally-edited payload may be
//! changed, and applies server acknowledgements to the per-record flags. The
//! rule table is pure; the tracker applies it against the store.

use crate::db::LocalStore;
use crate::entity::{EntityDescriptor, EntityKind};
use crate::error::Result;
use crate::models::{ContentItemId, ParentRef};
use crate::util::unix_timestamp_millis;

/// Where a proposed write originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteSource {
    /// A record fetched from the server during a sync pass.
    ServerFetch,
    /// A user action on this device (online or offline).
    UserEdit,
}

/// May this write overwrite the payload columns of an existing row?
///
/// A server fetch must never clobber a locally-edited payload; a user edit
/// always wins locally.
#[must_use]
pub const fn payload_overwrite_allowed(existing_is_edited: bool, source: WriteSource) -> bool {
    match source {
        WriteSource::ServerFetch => !existing_is_edited,
        WriteSource::UserEdit => true,
    }
}

/// The `is_edited` flag value after the write is applied.
#[must_use]
pub const fn resulting_is_edited(existing_is_edited: bool, source: WriteSource) -> bool {
    match source {
        WriteSource::ServerFetch => existing_is_edited,
        WriteSource::UserEdit => true,
    }
}

/// Applies flag transitions against the local store.
pub struct DirtyFlagTracker<'a> {
    store: &'a LocalStore<'a>,
}

impl<'a> DirtyFlagTracker<'a> {
    /// Create a new tracker over the given store
    pub const fn new(store: &'a LocalStore<'a>) -> Self {
        Self { store }
    }

    /// Record that the server acknowledged this record's queued write.
    ///
    /// Clears `is_edited`, sets `is_sync`, and marks a forced record's push
    /// as successful — for this record only, never as a side effect of an
    /// unrelated fetch. Returns false when the record no longer exists.
    pub async fn confirm_acknowledged(
        &self,
        descriptor: &EntityDescriptor,
        id: &ContentItemId,
    ) -> Result<bool> {
        let sql = format!(
            "UPDATE {} SET
                is_edited = 0,
                is_sync = 1,
                is_force_sync_success = CASE WHEN is_force_sync = 1 THEN 1 ELSE is_force_sync_success END,
                modified_utc = ?
             WHERE content_item_id = ?",
            descriptor.table
        );
        let affected = self
            .store
            .execute(&sql, (unix_timestamp_millis(), id.as_str()))
            .await?;
        Ok(affected > 0)
    }

    /// Number of this parent's children still holding unsynced state.
    pub async fn dirty_child_count(&self, parent: &ParentRef) -> Result<i64> {
        let mut total = 0;
        for kind in EntityKind::CHILD_KINDS {
            total += self
                .store
                .count_where(
                    kind.descriptor().table,
                    "parent_id = ? AND (is_edited = 1 OR (is_force_sync = 1 AND is_force_sync_success = 0))",
                    [parent.id.as_str()],
                )
                .await?;
        }
        Ok(total)
    }

    /// Clear the parent's sub-screen rollup flag once no child holds
    /// unsynced state. Returns whether the flag was cleared.
    pub async fn clear_parent_rollup_if_clean(&self, parent: &ParentRef) -> Result<bool> {
        if self.dirty_child_count(parent).await? > 0 {
            return Ok(false);
        }

        let sql = format!(
            "UPDATE {} SET is_sub_screen_edited = 0 WHERE content_item_id = ?",
            parent.kind.table()
        );
        self.store.execute(&sql, [parent.id.as_str()]).await?;
        Ok(true)
    }
}
