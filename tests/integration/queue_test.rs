//! Queue API scenarios: offline enqueue, then delivery once online

use crate::common::{engine_with, memory_db, next_report, RecordingApi};
use fieldsync::api_client::{HttpMethod, RemoteResponse};
use fieldsync::local_db::Draft;
use fieldsync::shared::{EntityKind, MutationKind, MutationStatus};
use fieldsync::sync::{NetworkStatus, SyncStatus};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_offline_job_update_delivered_when_online() {
    let api = Arc::new(RecordingApi::new());
    let engine = engine_with(memory_db().await, Arc::clone(&api), NetworkStatus::Offline).await;

    let receipt = engine
        .queue()
        .queue_job_update("job_1", json!({ "status": "completed" }))
        .await
        .unwrap();
    assert!(receipt.drain.is_none());

    assert_eq!(engine.state().current().pending_count, 1);
    let pending = engine.database().get_pending_mutations().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, MutationKind::Update);
    assert_eq!(pending[0].entity, EntityKind::Job);
    assert_eq!(pending[0].entity_id, "job_1");
    assert_eq!(pending[0].status, MutationStatus::Pending);
    assert!(api.requests().is_empty());

    let mut reports = engine.sync_manager().drain_reports();
    engine.set_online();
    let report = next_report(&mut reports).await;
    assert_eq!(report.delivered, 1);

    let requests = api.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, HttpMethod::Patch);
    assert_eq!(requests[0].path, "/api/jobs/job_1");
    assert_eq!(requests[0].body, Some(json!({ "status": "completed" })));

    assert!(engine.database().get_pending_mutations().await.unwrap().is_empty());
    let state = engine.state().current();
    assert_eq!(state.status, SyncStatus::Idle);
    assert_eq!(state.pending_count, 0);
    assert!(state.last_sync_at.is_some());
}

#[tokio::test]
async fn test_note_create_resolves_before_update() {
    let api = Arc::new(RecordingApi::new());
    api.respond("POST /api/notes", RemoteResponse::new(201, Some(json!({ "id": "note_42" }))));
    let db = memory_db().await;
    let engine = engine_with(Arc::clone(&db), Arc::clone(&api), NetworkStatus::Offline).await;

    let created = engine.queue().queue_note_create("job_1", "hello").await.unwrap();
    let temp_id = created.entity_id.clone();
    assert!(temp_id.starts_with("temp_"));

    engine
        .queue()
        .queue_note_update(&temp_id, "job_1", "hello world")
        .await
        .unwrap();
    db.save_draft(&Draft::new("draft_note_edit", "note", temp_id.as_str(), json!({ "content": "hello world!" })))
        .await
        .unwrap();

    let mut reports = engine.sync_manager().drain_reports();
    engine.set_online();
    assert_eq!(next_report(&mut reports).await.delivered, 2);

    assert_eq!(api.request_lines(), vec!["POST /api/notes", "PATCH /api/notes/note_42"]);
    let requests = api.requests();
    assert_eq!(requests[0].body, Some(json!({ "jobId": "job_1", "content": "hello" })));
    assert_eq!(requests[1].body, Some(json!({ "jobId": "job_1", "content": "hello world" })));

    let cached = db.get_cached_entity(EntityKind::Note, "note_42").await.unwrap().unwrap();
    assert_eq!(cached.data["content"], "hello world");
    assert!(db.get_cached_entity(EntityKind::Note, &temp_id).await.unwrap().is_none());

    let draft = db.get_draft_by_entity("note", "note_42").await.unwrap().unwrap();
    assert_eq!(draft.id, "draft_note_edit");
}

#[tokio::test]
async fn test_online_queue_call_returns_awaitable_drain() {
    let api = Arc::new(RecordingApi::new());
    let engine = engine_with(memory_db().await, Arc::clone(&api), NetworkStatus::Online).await;

    let receipt = engine.queue().queue_invoice_delete("inv_3").await.unwrap();
    receipt.drain.expect("drain kicked").await.unwrap().unwrap();

    assert_eq!(api.request_lines(), vec!["DELETE /api/invoices/inv_3"]);
    assert_eq!(api.requests()[0].body, None);
    assert_eq!(engine.state().current().pending_count, 0);
}
