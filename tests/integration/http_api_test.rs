//! The reqwest-backed remote API against a mock HTTP server

use crate::common::{memory_db, test_config};
use assert_matches::assert_matches;
use fieldsync::api_client::{HttpMethod, HttpRemoteApi, RemoteApi, RemoteRequest};
use fieldsync::engine::OfflineEngine;
use fieldsync::shared::{AppConfig, SyncError};
use fieldsync::sync::{NetworkStatus, NoopRegistrar, SyncStatus};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> AppConfig {
    let mut config = test_config();
    config.server_url = server.uri();
    config.auth_token = Some("tok_test".to_string());
    config
}

#[tokio::test]
async fn test_update_sends_bearer_token_and_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/jobs/job_1"))
        .and(header("authorization", "Bearer tok_test"))
        .and(body_json(json!({ "status": "completed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "job_1" })))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpRemoteApi::new(config_for(&server)).unwrap();
    let response = api
        .send(&RemoteRequest {
            method: HttpMethod::Patch,
            path: "/api/jobs/job_1".to_string(),
            body: Some(json!({ "status": "completed" })),
        })
        .await
        .unwrap();

    assert!(response.is_success());
    assert_eq!(response.body, Some(json!({ "id": "job_1" })));
}

#[tokio::test]
async fn test_error_status_is_a_response_not_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/invoices/inv_1"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({ "error": { "message": "Invoice already paid" } })),
        )
        .mount(&server)
        .await;

    let api = HttpRemoteApi::new(config_for(&server)).unwrap();
    let response = api
        .send(&RemoteRequest {
            method: HttpMethod::Delete,
            path: "/api/invoices/inv_1".to_string(),
            body: None,
        })
        .await
        .unwrap();

    assert_eq!(response.status, 409);
    let err = response.into_result().unwrap_err();
    assert_eq!(err.to_string(), "Invoice already paid");
}

#[tokio::test]
async fn test_unreachable_server_is_a_network_error() {
    let mut config = test_config();
    config.server_url = "http://127.0.0.1:9".to_string();
    config.request_timeout = Duration::from_secs(2);

    let api = HttpRemoteApi::new(config).unwrap();
    let result = api
        .send(&RemoteRequest {
            method: HttpMethod::Post,
            path: "/api/jobs".to_string(),
            body: Some(json!({})),
        })
        .await;

    assert_matches!(result, Err(SyncError::Network { .. }));
}

#[tokio::test]
async fn test_engine_delivers_through_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/notes"))
        .and(body_json(json!({ "jobId": "job_1", "content": "hello" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "data": { "id": "note_7" } })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/notes/note_7"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let api = Arc::new(HttpRemoteApi::new(config.clone()).unwrap());
    let engine = OfflineEngine::with_parts(
        config,
        memory_db().await,
        api,
        Arc::new(NoopRegistrar),
        NetworkStatus::Offline,
    )
    .await
    .unwrap();

    let created = engine.queue().queue_note_create("job_1", "hello").await.unwrap();
    engine.queue().queue_note_delete(&created.entity_id).await.unwrap();

    engine.set_online();
    let mut state = engine.state().watch();
    tokio::time::timeout(
        Duration::from_secs(10),
        state.wait_for(|s| s.pending_count == 0 && s.status == SyncStatus::Idle),
    )
    .await
    .expect("log drained")
    .unwrap();
}
