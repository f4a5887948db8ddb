//! # Sync State Management
//!
//! Process-wide synchronization state observed by the UI. The store is an
//! owned object shared by `Arc`; only the sync manager writes to it.
//!
//! ## Features
//!
//! - **Callback Subscriptions**: current state delivered on subscribe, then on every change
//! - **Async Watching**: a `watch` receiver for tasks that prefer awaiting changes
//! - **Not Persisted**: rebuilt from the local store on startup

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::watch;

/// Coarse sync status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Nothing running, last pass clean
    Idle,
    /// A drain pass is running
    Syncing,
    /// The last pass left failures behind
    Error,
}

/// Snapshot of the engine's sync progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    pub status: SyncStatus,
    /// End of the last completed drain pass
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Mutations still in the log, failed ones included
    pub pending_count: u64,
    /// Mutations that exhausted their retries
    pub failed_count: u64,
    /// Banner text for the last failure, if any
    pub error: Option<String>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            status: SyncStatus::Idle,
            last_sync_at: None,
            pending_count: 0,
            failed_count: 0,
            error: None,
        }
    }
}

type Listener = Arc<dyn Fn(&SyncState) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    callbacks: BTreeMap<u64, Listener>,
}

/// Observable holder of [`SyncState`]
pub struct SyncStateStore {
    state: watch::Sender<SyncState>,
    listeners: Arc<Mutex<Listeners>>,
}

impl std::fmt::Debug for SyncStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncStateStore")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl SyncStateStore {
    pub fn new(initial: SyncState) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state,
            listeners: Arc::new(Mutex::new(Listeners::default())),
        }
    }

    /// Current snapshot
    pub fn current(&self) -> SyncState {
        self.state.borrow().clone()
    }

    /// Receiver that resolves on every published change
    pub fn watch(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Register a callback
    ///
    /// The callback runs immediately with the current state and then after
    /// every change until the returned [`Subscription`] is dropped or
    /// unsubscribed.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SyncState) + Send + Sync + 'static,
    {
        let callback: Listener = Arc::new(callback);
        callback(&self.current());

        let mut listeners = lock(&self.listeners);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.callbacks.insert(id, callback);

        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Apply a change and notify every subscriber
    pub(crate) fn update(&self, change: impl FnOnce(&mut SyncState)) {
        self.state.send_modify(change);
        let snapshot = self.current();

        let callbacks: Vec<Listener> = lock(&self.listeners).callbacks.values().cloned().collect();
        for callback in callbacks {
            callback(&snapshot);
        }
    }

    /// Number of live callback subscriptions
    pub fn subscriber_count(&self) -> usize {
        lock(&self.listeners).callbacks.len()
    }
}

fn lock(listeners: &Mutex<Listeners>) -> std::sync::MutexGuard<'_, Listeners> {
    // Callbacks run outside the lock, so a poisoned lock still holds a
    // consistent map.
    listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle returned by [`SyncStateStore::subscribe`]
#[must_use = "dropping a Subscription unsubscribes it"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    /// Stop receiving updates
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners).callbacks.remove(&self.id);
        }
    }
}
