//! # Sync Scheduler
//!
//! Resumption triggers for the drain loop. Each trigger only calls
//! [`SyncManager::drain`]; overlapping triggers collapse through its
//! single-flight guard.
//!
//! ## Triggers
//!
//! - **Online Transition**: the network monitor flips to online
//! - **Periodic**: every `sync_interval` while online with records left to
//!   deliver (failed records wait for a user retry)
//! - **Background Sync Complete**: the host reports its deferred sync fired

use crate::sync::network_monitor::NetworkStatus;
use crate::sync::SyncManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Running trigger tasks; dropping this stops them
#[derive(Debug)]
pub struct ConnectivityTriggers {
    background_complete: Arc<Notify>,
    tasks: Vec<JoinHandle<()>>,
}

impl ConnectivityTriggers {
    /// Spawn every trigger for `manager`
    pub fn start(manager: Arc<SyncManager>, interval: Duration) -> Self {
        let background_complete = Arc::new(Notify::new());

        let tasks = vec![
            tokio::spawn(on_online(Arc::clone(&manager), manager.network().subscribe())),
            tokio::spawn(periodic(Arc::clone(&manager), interval)),
            tokio::spawn(on_background_complete(manager, Arc::clone(&background_complete))),
        ];
        tracing::debug!(?interval, "Sync triggers started");

        Self {
            background_complete,
            tasks,
        }
    }

    /// Called by the host when its background sync for our tag fired
    pub fn notify_background_sync_complete(&self) {
        self.background_complete.notify_one();
    }

    /// Abort every trigger task
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for ConnectivityTriggers {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn on_online(manager: Arc<SyncManager>, mut status: watch::Receiver<NetworkStatus>) {
    while status.changed().await.is_ok() {
        let current = *status.borrow_and_update();
        if current == NetworkStatus::Online {
            tracing::info!("Back online, draining mutation log");
            let _ = manager.spawn_drain();
        }
    }
}

async fn periodic(manager: Arc<SyncManager>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if !manager.network().is_online() || !has_retryable_work(&manager) {
            continue;
        }
        tracing::debug!("Periodic sync");
        let _ = manager.spawn_drain();
    }
}

/// Failed records are counted in `pending_count` but never replayed
fn has_retryable_work(manager: &SyncManager) -> bool {
    let state = manager.state().current();
    state.pending_count > state.failed_count
}

async fn on_background_complete(manager: Arc<SyncManager>, signal: Arc<Notify>) {
    loop {
        signal.notified().await;
        tracing::debug!("Background sync complete, draining mutation log");
        let _ = manager.spawn_drain();
    }
}
