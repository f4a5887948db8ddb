//! The SSE inbox channel against a mock HTTP server

use crate::common::test_config;
use assert_matches::assert_matches;
use fieldsync::offline::{BackoffStrategy, RetryPolicy};
use fieldsync::realtime::{ChannelConnector, ChannelState, Reconnector, SseInboxChannel};
use fieldsync::shared::{AppConfig, SyncError};
use futures_util::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STREAM_BODY: &str = ": keep-alive\n\n\
event: message\n\
data: {\"id\":\"msg_1\",\"subject\":\"Job assigned\"}\n\n\
data: {\"id\":\"msg_2\"}\n\n";

fn config_for(server: &MockServer) -> AppConfig {
    let mut config = test_config();
    config.server_url = server.uri();
    config.auth_token = Some("tok_test".to_string());
    config
}

async fn mount_stream(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/inbox/stream"))
        .and(header("authorization", "Bearer tok_test"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(STREAM_BODY),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_stream_yields_parsed_events() {
    let server = MockServer::start().await;
    mount_stream(&server).await;

    let channel = SseInboxChannel::new(config_for(&server)).unwrap();
    let events: Vec<_> = channel.connect().await.unwrap().collect().await;

    assert_eq!(events.len(), 2);
    let first = events[0].as_ref().unwrap();
    assert_eq!(first.event.as_deref(), Some("message"));
    assert_eq!(first.data, json!({ "id": "msg_1", "subject": "Job assigned" }));
    assert_eq!(events[1].as_ref().unwrap().data, json!({ "id": "msg_2" }));
}

#[tokio::test]
async fn test_rejected_subscription_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/inbox/stream"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let channel = SseInboxChannel::new(config_for(&server)).unwrap();
    // The Ok payload is a boxed stream without Debug; drop it so assert_matches! can format.
    let result = channel.connect().await.map(|_| ());

    assert_matches!(result, Err(SyncError::Http { status: 401, .. }));
}

#[tokio::test]
async fn test_reconnector_forwards_inbox_events() {
    let server = MockServer::start().await;
    mount_stream(&server).await;

    let channel = Arc::new(SseInboxChannel::new(config_for(&server)).unwrap());
    let policy = RetryPolicy::new(
        3,
        BackoffStrategy::Exponential {
            base: Duration::from_millis(50),
            max: Duration::from_millis(200),
        },
    );
    let reconnector = Reconnector::spawn(channel, policy);
    let mut events = reconnector.subscribe();

    let first = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("event received")
        .unwrap();
    assert_eq!(first.data["id"], "msg_1");

    // The mock body ends, so the channel cycles back through disconnected
    let mut state = reconnector.watch_state();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == ChannelState::Disconnected),
    )
    .await
    .expect("stream end observed")
    .unwrap();

    reconnector.shutdown();
}
