//! Drain pass behavior: ordering, retries, single-flight and going offline

use crate::common::{engine_with, memory_db, next_report, test_config, RecordingApi};
use assert_matches::assert_matches;
use async_trait::async_trait;
use fieldsync::api_client::{RemoteApi, RemoteRequest, RemoteResponse};
use fieldsync::local_db::LocalDatabase;
use fieldsync::offline::{QueueOptions, RetryPolicy};
use fieldsync::shared::{EntityKind, MutationKind, MutationStatus, NewMutation, SyncError};
use fieldsync::sync::{
    DrainOutcome, HaltReason, NetworkMonitor, NetworkStatus, SkipReason, SyncManager, SyncStatus,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_three_server_errors_fail_the_mutation() {
    let api = Arc::new(RecordingApi::new());
    api.fail("PATCH /api/jobs/job_1", 500, 3);
    let engine = engine_with(memory_db().await, Arc::clone(&api), NetworkStatus::Online).await;

    let receipt = engine
        .queue()
        .queue_job_update("job_1", json!({ "status": "completed" }))
        .await
        .unwrap();
    let outcome = receipt.drain.unwrap().await.unwrap().unwrap();
    assert_matches!(outcome, DrainOutcome::Completed(report) if report.failed == 1 && report.delivered == 0);

    let failed = engine
        .database()
        .get_mutation(&receipt.mutation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.status, MutationStatus::Failed);
    assert_eq!(failed.retries, 3);
    assert_eq!(failed.last_error.as_deref(), Some("Request failed with status 500"));

    let state = engine.state().current();
    assert_eq!(state.status, SyncStatus::Error);
    assert_eq!(state.error.as_deref(), Some("1 change failed to sync"));
    assert_eq!(state.failed_count, 1);
    assert_eq!(state.pending_count, 1);

    // Excluded from the next online-triggered pass
    engine
        .queue()
        .queue_update(EntityKind::Job, "job_2", json!({ "status": "open" }), QueueOptions::deferred())
        .await
        .unwrap();
    engine.set_offline();
    let mut reports = engine.sync_manager().drain_reports();
    engine.set_online();
    assert_eq!(next_report(&mut reports).await.delivered, 1);

    assert_eq!(
        api.request_lines(),
        vec![
            "PATCH /api/jobs/job_1",
            "PATCH /api/jobs/job_1",
            "PATCH /api/jobs/job_1",
            "PATCH /api/jobs/job_2",
        ]
    );
    assert_eq!(engine.state().current().status, SyncStatus::Idle);
    assert_eq!(engine.state().current().failed_count, 1);
}

#[tokio::test]
async fn test_fewer_failures_stay_pending_until_delivered() {
    let api = Arc::new(RecordingApi::new());
    api.fail("PATCH /api/customers/cus_1", 503, 2);
    let engine = engine_with(memory_db().await, Arc::clone(&api), NetworkStatus::Online).await;

    let receipt = engine
        .queue()
        .queue_customer_update("cus_1", json!({ "phone": "555-0100" }))
        .await
        .unwrap();
    let outcome = receipt.drain.unwrap().await.unwrap().unwrap();

    assert_matches!(outcome, DrainOutcome::Completed(report) if report.delivered == 1 && report.is_clean());
    assert_eq!(api.request_lines().len(), 3);
    assert!(engine.database().get_pending_mutations().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_drains_never_overlap() {
    let api = Arc::new(RecordingApi::with_latency(Duration::from_millis(20)));
    let engine = engine_with(memory_db().await, Arc::clone(&api), NetworkStatus::Online).await;

    for id in ["job_1", "job_2", "job_3"] {
        engine
            .queue()
            .queue_update(EntityKind::Job, id, json!({ "status": "completed" }), QueueOptions::deferred())
            .await
            .unwrap();
    }

    let manager = engine.sync_manager();
    let (first, second) = tokio::join!(manager.drain(), manager.drain());
    let outcomes = [first.unwrap(), second.unwrap()];

    let skipped = outcomes
        .iter()
        .filter(|o| **o == DrainOutcome::Skipped(SkipReason::AlreadyRunning))
        .count();
    assert_eq!(skipped, 1);
    assert_eq!(api.max_in_flight(), 1);
    assert_eq!(
        api.request_lines(),
        vec!["PATCH /api/jobs/job_1", "PATCH /api/jobs/job_2", "PATCH /api/jobs/job_3"]
    );
}

/// Fails every request and reports the network as gone while doing so
struct DropsNetwork {
    network: Arc<NetworkMonitor>,
}

#[async_trait]
impl RemoteApi for DropsNetwork {
    async fn send(&self, _request: &RemoteRequest) -> Result<RemoteResponse, SyncError> {
        self.network.set_offline();
        Err(SyncError::network("connection reset"))
    }
}

#[tokio::test]
async fn test_going_offline_mid_pass_leaves_records_pending() {
    let db = Arc::new(LocalDatabase::open_in_memory().await.unwrap());
    let network = Arc::new(NetworkMonitor::new(NetworkStatus::Online));
    let api = Arc::new(DropsNetwork {
        network: Arc::clone(&network),
    });
    let manager = SyncManager::new(
        Arc::clone(&db),
        api,
        Arc::clone(&network),
        RetryPolicy::mutation_delivery(&test_config()),
    )
    .await
    .unwrap();

    for id in ["job_1", "job_2"] {
        db.add_mutation(NewMutation {
            kind: MutationKind::Update,
            entity: EntityKind::Job,
            entity_id: id.to_string(),
            data: json!({ "status": "completed" }),
        })
        .await
        .unwrap();
    }

    let outcome = manager.drain().await.unwrap();
    assert_matches!(
        outcome,
        DrainOutcome::Completed(report) if report.halted == Some(HaltReason::WentOffline) && report.delivered == 0
    );

    let mut log = db.get_pending_mutations().await.unwrap();
    log.sort_by_key(|m| m.created_at);
    assert_eq!(log[0].status, MutationStatus::Pending);
    assert_eq!(log[0].retries, 1);
    assert_eq!(log[0].last_error.as_deref(), Some("Network error: connection reset"));
    assert_eq!(log[1].status, MutationStatus::Pending);
    assert_eq!(log[1].retries, 0);

    assert_eq!(manager.drain().await.unwrap(), DrainOutcome::Skipped(SkipReason::Offline));
}

#[tokio::test]
async fn test_discard_and_retry_all_failed() {
    let api = Arc::new(RecordingApi::new());
    api.fail("DELETE /api/jobs/job_1", 500, 3);
    api.fail("DELETE /api/jobs/job_2", 500, 3);
    let engine = engine_with(memory_db().await, Arc::clone(&api), NetworkStatus::Online).await;

    let first = engine.queue().queue_job_delete("job_1").await.unwrap();
    first.drain.unwrap().await.unwrap().unwrap();
    let second = engine.queue().queue_job_delete("job_2").await.unwrap();
    second.drain.unwrap().await.unwrap().unwrap();
    assert_eq!(engine.state().current().failed_count, 2);

    assert!(engine.sync_manager().discard(&first.mutation_id).await.unwrap());
    assert_eq!(engine.state().current().pending_count, 1);

    let requeued = engine.sync_manager().retry_all_failed().await.unwrap();
    assert_eq!(requeued.count, 1);
    requeued.drain.unwrap().await.unwrap().unwrap();

    let state = engine.state().current();
    assert_eq!(state.pending_count, 0);
    assert_eq!(state.failed_count, 0);
    assert_eq!(state.status, SyncStatus::Idle);
    assert_eq!(api.request_lines().last().map(String::as_str), Some("DELETE /api/jobs/job_2"));
}
