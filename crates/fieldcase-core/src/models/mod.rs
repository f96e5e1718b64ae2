//! Models for fieldcase entities and their sync metadata.

mod case;
mod ids;
mod lookup;
mod meta;
mod record;

pub use case::{AdminNote, CaseSummary};
pub use ids::{ContentItemId, CorrelationId};
pub use lookup::{LookupEntry, LookupKind};
pub use meta::{ParentKind, ParentRef, SyncMeta};
pub use record::{json_to_value, value_to_json, IncomingRecord, StoredRecord};
