//! End-to-end offline round-trip over the public API: mirror a case, edit it
//! offline, survive a background refresh, reconnect, push, and verify the
//! flags settle.

use std::collections::HashMap;
use std::sync::Mutex;

use libsql::Value;
use serde_json::json;

use fieldcase_core::db::{Database, LocalStore};
use fieldcase_core::entity::EntityKind;
use fieldcase_core::models::{ContentItemId, IncomingRecord, ParentKind, ParentRef};
use fieldcase_core::sync::{
    ApiResponse, RemoteApi, StaticReachability, SyncOrchestrator, SyncResult,
};

#[derive(Default)]
struct ScriptedApi {
    get_bodies: Mutex<HashMap<String, serde_json::Value>>,
    assigned_ids: HashMap<String, String>,
}

impl ScriptedApi {
    fn set_get(&self, path: &str, body: serde_json::Value) {
        self.get_bodies
            .lock()
            .unwrap()
            .insert(path.to_string(), body);
    }
}

impl RemoteApi for ScriptedApi {
    async fn get(&self, path: &str) -> SyncResult<ApiResponse> {
        let body = self
            .get_bodies
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_else(|| json!([]));
        Ok(ApiResponse { status: 200, body })
    }

    async fn post_with_token(
        &self,
        _path: &str,
        body: &serde_json::Value,
    ) -> SyncResult<ApiResponse> {
        let local_id = body["syncContentItemId"].as_str().unwrap_or_default();
        let mut ack = json!({ "accepted": true });
        if let Some(server_id) = self.assigned_ids.get(local_id) {
            ack["contentItemId"] = json!(server_id);
        }
        Ok(ApiResponse {
            status: 200,
            body: ack,
        })
    }
}

fn case_element(description: &str) -> serde_json::Value {
    json!([{
        "contentItemId": "case-1",
        "caseNumber": "C-100",
        "caseType": "building-permit",
        "status": "open",
        "description": description,
        "applicantName": "Dana Reyes",
        "address": "12 Hill Rd",
        "apiChangeDateUtc": "2026-08-01T10:00:00Z"
    }])
}

fn edited_case_payload(description: &str) -> Vec<Value> {
    vec![
        Value::Text("C-100".into()),
        Value::Text("building-permit".into()),
        Value::Text("open".into()),
        Value::Text(description.into()),
        Value::Text("Dana Reyes".into()),
        Value::Text("12 Hill Rd".into()),
    ]
}

#[tokio::test(flavor = "multi_thread")]
async fn edit_survives_refresh_and_clears_on_acknowledged_push() {
    let db = Database::open_in_memory().await.unwrap();
    let store = LocalStore::new(db.connection());
    let api = ScriptedApi::default();
    let oracle = StaticReachability::new(true);
    let orchestrator = SyncOrchestrator::new(&store, &api, &oracle);
    let descriptor = EntityKind::Case.descriptor();
    let case_id = ContentItemId::from("case-1");

    // Server fetch mirrors C1 locally, clean.
    api.set_get("cases", case_element("server description"));
    orchestrator.sync_parents(ParentKind::Case).await.unwrap();
    let record = store
        .fetch_record(descriptor, &case_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!record.meta.is_edited);

    // Connectivity drops; the user edits the description.
    oracle.set_online(false);
    orchestrator
        .save_parent_offline(
            ParentKind::Case,
            IncomingRecord::new("case-1", None, edited_case_payload("gate access from rear lane")),
        )
        .await
        .unwrap();

    // A background refresh (device back online) carries different server
    // text; the local edit must win.
    oracle.set_online(true);
    api.set_get("cases", case_element("newer server description"));
    let report = orchestrator.sync_parents(ParentKind::Case).await.unwrap();
    assert_eq!(report.skipped_edited, 1);

    let record = store
        .fetch_record(descriptor, &case_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        record.payload_value(descriptor, "description"),
        Some(&Value::Text("gate access from rear lane".into()))
    );
    assert!(record.meta.is_edited);

    // The acknowledged push clears the dirty flag.
    orchestrator
        .push_pending_kind(EntityKind::Case)
        .await
        .unwrap();
    let record = store
        .fetch_record(descriptor, &case_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!record.meta.is_edited);
    assert!(record.meta.is_sync);
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_created_record_round_trips_to_synced() {
    let db = Database::open_in_memory().await.unwrap();
    let store = LocalStore::new(db.connection());

    let parent_id = ContentItemId::local();
    let note_id = ContentItemId::local();
    let mut api = ScriptedApi::default();
    api.assigned_ids
        .insert(parent_id.as_str().to_string(), "case-800".to_string());
    api.assigned_ids
        .insert(note_id.as_str().to_string(), "note-321".to_string());

    let oracle = StaticReachability::new(false);
    let orchestrator = SyncOrchestrator::new(&store, &api, &oracle);

    // Created while offline: dirty and queued for force sync.
    let parent = ParentRef::new(ParentKind::Case, parent_id.clone());
    orchestrator
        .save_offline(
            EntityKind::AdminNote,
            &parent,
            IncomingRecord::new(
                note_id.clone(),
                None,
                vec![Value::Text("no site access before 9am".into()), Value::Null],
            ),
        )
        .await
        .unwrap();

    let note = store
        .fetch_record(EntityKind::AdminNote.descriptor(), &note_id)
        .await
        .unwrap()
        .unwrap();
    assert!(note.meta.is_edited);
    assert!(note.meta.is_force_sync);

    // Remote calls are refused while the oracle reports offline.
    assert!(orchestrator.push_all().await.is_err());

    // Reconnect and replay.
    oracle.set_online(true);
    orchestrator.push_all().await.unwrap();

    let note = store
        .fetch_record(
            EntityKind::AdminNote.descriptor(),
            &ContentItemId::from("note-321"),
        )
        .await
        .unwrap()
        .unwrap();
    assert!(!note.meta.is_edited);
    assert!(note.meta.is_sync);
    assert!(note.meta.is_force_sync_success);
    assert_eq!(note.parent.as_ref().unwrap().id.as_str(), "case-800");

    // Exactly one row per logical record after promotion.
    assert_eq!(
        store.count_where("admin_notes", "1 = 1", ()).await.unwrap(),
        1
    );
    assert_eq!(store.count_where("cases", "1 = 1", ()).await.unwrap(), 1);
}
