//! # Inbox Stream
//!
//! Server-Sent Events channel carrying inbox notifications. The connection
//! is opened by [`SseInboxChannel`] and kept alive by the
//! [`Reconnector`](crate::realtime::Reconnector); nothing received here is
//! persisted.
//!
//! ## Wire Format
//!
//! ```text
//! event: message
//! data: {"id":"msg_1","subject":"Job assigned"}
//!
//! ```
//!
//! `data:` lines are joined and parsed as JSON when a blank line ends the
//! event. Comment lines (`:`) are keep-alives and ignored.

use crate::realtime::reconnector::{ChannelConnector, EventStream};
use crate::shared::config::AppConfig;
use crate::shared::error::SyncError;
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// One event received on the inbox stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxEvent {
    /// SSE `event:` field, if the server set one
    pub event: Option<String>,
    /// Parsed `data:` payload
    pub data: serde_json::Value,
}

/// Incremental SSE decoder
///
/// Bytes are buffered until a full line is available, so chunks may split
/// lines and multi-byte characters anywhere.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every event it completed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<InboxEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let line = line.trim_end_matches('\r');

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
            } else if line.starts_with(':') {
                continue;
            } else if let Some(value) = field(line, "data") {
                self.data.push(value.to_string());
            } else if let Some(value) = field(line, "event") {
                self.event = Some(value.to_string());
            }
        }
        events
    }

    fn dispatch(&mut self) -> Option<InboxEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let payload = self.data.join("\n");
        self.data.clear();

        match serde_json::from_str(&payload) {
            Ok(data) => Some(InboxEvent { event, data }),
            Err(err) => {
                tracing::warn!("Failed to parse inbox event data: {} | data: {}", err, payload);
                None
            }
        }
    }
}

fn field<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let value = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(value.strip_prefix(' ').unwrap_or(value))
}

/// reqwest-backed inbox stream
#[derive(Debug, Clone)]
pub struct SseInboxChannel {
    config: AppConfig,
    client: Client,
}

impl SseInboxChannel {
    pub fn new(config: AppConfig) -> Result<Self, SyncError> {
        // No overall timeout: the response body is open-ended
        let client = Client::builder()
            .connect_timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl ChannelConnector for SseInboxChannel {
    async fn connect(&self) -> Result<EventStream, SyncError> {
        let url = self.config.api_url(&self.config.inbox_stream_path);
        tracing::debug!("Subscribing to inbox stream: {}", url);

        let mut request = self.client.get(&url).header(ACCEPT, "text/event-stream");
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::http(
                status.as_u16(),
                format!("Inbox subscription failed with status {}", status.as_u16()),
            ));
        }

        let mut parser = SseParser::new();
        let events = response.bytes_stream().flat_map(move |chunk| {
            let items: Vec<Result<InboxEvent, SyncError>> = match chunk {
                Ok(bytes) => parser.feed(&bytes).into_iter().map(Ok).collect(),
                Err(err) => vec![Err(SyncError::from(err))],
            };
            stream::iter(items)
        });
        Ok(events.boxed())
    }
}
