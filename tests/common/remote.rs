//! Recording remote API for integration tests
//!
//! Responses are scripted per `"METHOD path"` key; unscripted requests get a
//! `200` with no body. Every request is recorded, and the number of requests
//! in flight at once is tracked so overlap can be asserted.

use async_trait::async_trait;
use fieldsync::api_client::{RemoteApi, RemoteRequest, RemoteResponse};
use fieldsync::shared::SyncError;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct RecordingApi {
    script: Mutex<HashMap<String, VecDeque<RemoteResponse>>>,
    requests: Mutex<Vec<RemoteRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Duration,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every request for `latency` before answering
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Queue a response for the next request matching `key`
    pub fn respond(&self, key: &str, response: RemoteResponse) {
        self.script
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(response);
    }

    /// Answer the next `times` requests matching `key` with `status`
    pub fn fail(&self, key: &str, status: u16, times: usize) {
        for _ in 0..times {
            self.respond(key, RemoteResponse::new(status, None));
        }
    }

    /// Every request seen so far, as `"METHOD path"`
    pub fn request_lines(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|r| r.to_string()).collect()
    }

    pub fn requests(&self) -> Vec<RemoteRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteApi for RecordingApi {
    async fn send(&self, request: &RemoteRequest) -> Result<RemoteResponse, SyncError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let scripted = self
            .script
            .lock()
            .unwrap()
            .get_mut(&request.to_string())
            .and_then(VecDeque::pop_front);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(scripted.unwrap_or_else(|| RemoteResponse::new(200, None)))
    }
}
