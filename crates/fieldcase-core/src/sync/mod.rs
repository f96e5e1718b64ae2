//! Offline-first sync engine: dirty-flag tracking, upsert reconciliation,
//! identity promotion, and the per-entity-kind orchestrator.

mod envelope;
mod flags;
mod identity;
mod orchestrator;
mod reconcile;
mod remote;

pub use envelope::{SyncAck, SyncEnvelope};
pub use flags::{payload_overwrite_allowed, resulting_is_edited, DirtyFlagTracker, WriteSource};
pub use identity::{IdentityResolver, Promotion};
pub use orchestrator::{PushReport, SyncOrchestrator, SyncReport};
pub use reconcile::{Outcome, Reconciler};
pub use remote::{
    ApiResponse, HttpRemoteApi, Reachability, RemoteApi, StaticReachability, SyncError, SyncResult,
};
