//! # Live Channel Reconnector
//!
//! Keeps a live channel connected. A failed connect or a dropped stream moves
//! the channel to `Disconnected` and schedules another attempt with
//! exponential backoff. After the attempt budget is spent the reconnector
//! waits for a manual [`Reconnector::reconnect`].
//!
//! ```text
//! Connecting ──ok──▶ Connected ──stream ends──▶ Disconnected
//!     ▲                                             │
//!     └──────── backoff, or manual reconnect ◀──────┘
//! ```
//!
//! Nothing is queued while disconnected; events missed during an outage are
//! the server's to replay.

use crate::offline::retry::RetryPolicy;
use crate::realtime::inbox::InboxEvent;
use crate::shared::error::SyncError;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;

/// Events delivered by an open channel
pub type EventStream = BoxStream<'static, Result<InboxEvent, SyncError>>;

const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    Connecting,
    Connected,
    Disconnected,
}

/// Opens one connection of a live channel
#[async_trait]
pub trait ChannelConnector: Send + Sync + 'static {
    async fn connect(&self) -> Result<EventStream, SyncError>;
}

/// Handle to the background connection loop
#[derive(Debug)]
pub struct Reconnector {
    state: watch::Receiver<ChannelState>,
    events: broadcast::Sender<InboxEvent>,
    manual: Arc<Notify>,
    attempts: Arc<AtomicU32>,
    task: JoinHandle<()>,
}

impl Reconnector {
    /// Start connecting immediately on a background task
    pub fn spawn(connector: Arc<dyn ChannelConnector>, policy: RetryPolicy) -> Self {
        let (state_tx, state) = watch::channel(ChannelState::Connecting);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let manual = Arc::new(Notify::new());
        let attempts = Arc::new(AtomicU32::new(0));

        let worker = Worker {
            connector,
            policy,
            state: state_tx,
            events: events.clone(),
            manual: Arc::clone(&manual),
            attempts: Arc::clone(&attempts),
        };
        let task = tokio::spawn(worker.run());

        Self {
            state,
            events,
            manual,
            attempts,
            task,
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    /// Receive events from every future connection
    pub fn subscribe(&self) -> broadcast::Receiver<InboxEvent> {
        self.events.subscribe()
    }

    /// Consecutive failed attempts since the last successful connect
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Reset the attempt counter and reconnect now, skipping any backoff
    pub fn reconnect(&self) {
        tracing::info!("Manual reconnect requested");
        self.manual.notify_one();
    }

    /// Stop the connection loop
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for Reconnector {
    fn drop(&mut self) {
        self.task.abort();
    }
}

enum StreamEnd {
    Closed,
    Failed(SyncError),
    ManualReconnect,
}

struct Worker {
    connector: Arc<dyn ChannelConnector>,
    policy: RetryPolicy,
    state: watch::Sender<ChannelState>,
    events: broadcast::Sender<InboxEvent>,
    manual: Arc<Notify>,
    attempts: Arc<AtomicU32>,
}

impl Worker {
    async fn run(self) {
        let mut failures: u32 = 0;

        loop {
            self.state.send_replace(ChannelState::Connecting);

            let skip_backoff = match self.connector.connect().await {
                Ok(stream) => {
                    failures = 0;
                    self.attempts.store(0, Ordering::SeqCst);
                    self.state.send_replace(ChannelState::Connected);
                    tracing::info!("Live channel connected");

                    match self.pump(stream).await {
                        StreamEnd::Closed => {
                            tracing::info!("Live channel closed by server");
                            false
                        }
                        StreamEnd::Failed(err) => {
                            tracing::warn!("Live channel connection lost: {}", err);
                            false
                        }
                        StreamEnd::ManualReconnect => true,
                    }
                }
                Err(err) => {
                    tracing::warn!("Live channel connect failed: {}", err);
                    false
                }
            };

            self.state.send_replace(ChannelState::Disconnected);
            if skip_backoff {
                failures = 0;
                self.attempts.store(0, Ordering::SeqCst);
                continue;
            }

            failures += 1;
            self.attempts.store(failures, Ordering::SeqCst);

            if self.policy.is_exhausted(failures) {
                tracing::warn!(attempts = failures, "Live channel giving up until a manual reconnect");
                self.manual.notified().await;
            } else {
                let delay = self.policy.delay(failures);
                tracing::debug!(attempt = failures, ?delay, "Live channel reconnecting after backoff");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => continue,
                    _ = self.manual.notified() => {}
                }
            }

            failures = 0;
            self.attempts.store(0, Ordering::SeqCst);
        }
    }

    async fn pump(&self, mut stream: EventStream) -> StreamEnd {
        loop {
            tokio::select! {
                item = stream.next() => match item {
                    Some(Ok(event)) => {
                        // No receivers is fine; events are not retained
                        let _ = self.events.send(event);
                    }
                    Some(Err(err)) => return StreamEnd::Failed(err),
                    None => return StreamEnd::Closed,
                },
                _ = self.manual.notified() => return StreamEnd::ManualReconnect,
            }
        }
    }
}
