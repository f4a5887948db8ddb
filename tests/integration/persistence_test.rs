//! Restart behavior: the log survives, and delivery resumes on reopen

use crate::common::{engine_with, file_db, RecordingApi};
use fieldsync::offline::QueueOptions;
use fieldsync::shared::{EntityKind, MutationStatus};
use fieldsync::sync::NetworkStatus;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_reopen_preserves_log_and_resumes_draining() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("offline.db");

    let (pending_id, failed_id, interrupted_id) = {
        let db = file_db(&path).await;
        let engine = engine_with(Arc::clone(&db), Arc::new(RecordingApi::new()), NetworkStatus::Offline).await;
        let queue = engine.queue();

        let pending = queue
            .queue_job_update("job_1", json!({ "status": "completed" }))
            .await
            .unwrap();
        let failed = queue.queue_invoice_delete("inv_1").await.unwrap();
        let interrupted = queue
            .queue_create(EntityKind::Customer, json!({ "name": "Ada" }), QueueOptions::deferred())
            .await
            .unwrap();

        db.update_mutation_status(&failed.mutation_id, MutationStatus::Failed, Some("gone"))
            .await
            .unwrap();
        db.update_mutation_status(&interrupted.mutation_id, MutationStatus::InProgress, None)
            .await
            .unwrap();

        engine.shutdown().await;
        (pending.mutation_id, failed.mutation_id, interrupted.mutation_id)
    };

    let db = file_db(&path).await;
    let recovered = db.get_mutation(&interrupted_id).await.unwrap().unwrap();
    assert_eq!(recovered.status, MutationStatus::Pending);
    assert_eq!(db.get_pending_mutations().await.unwrap().len(), 3);

    let api = Arc::new(RecordingApi::new());
    let mut engine = engine_with(Arc::clone(&db), Arc::clone(&api), NetworkStatus::Online).await;
    assert_eq!(engine.state().current().pending_count, 3);
    assert_eq!(engine.state().current().failed_count, 1);

    let drain = engine.take_startup_drain().expect("startup drain kicked");
    drain.await.unwrap().unwrap();

    assert_eq!(api.request_lines(), vec!["PATCH /api/jobs/job_1", "POST /api/customers"]);
    assert!(db.get_mutation(&pending_id).await.unwrap().is_none());
    assert_eq!(
        db.get_mutation(&failed_id).await.unwrap().unwrap().status,
        MutationStatus::Failed
    );
    assert!(db.get_last_sync_at().await.unwrap().is_some());
    assert_eq!(engine.state().current().pending_count, 1);
}

#[tokio::test]
async fn test_no_startup_drain_without_pending_work() {
    let dir = TempDir::new().unwrap();
    let db = file_db(&dir.path().join("offline.db")).await;

    let mut engine = engine_with(db, Arc::new(RecordingApi::new()), NetworkStatus::Online).await;
    assert!(engine.take_startup_drain().is_none());
}
