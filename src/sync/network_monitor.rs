//! # Network Monitor
//!
//! Tracks online/offline status reported by the host platform and publishes
//! transitions to the sync triggers.
//!
//! ## Features
//!
//! - **Connectivity Detection**: the host calls `set_online` / `set_offline`
//! - **Real-time Updates**: transitions published over a `watch` channel
//! - **Mid-pass Checks**: the drain loop reads `is_online` between records

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    Online,
    Offline,
}

#[derive(Debug)]
pub struct NetworkMonitor {
    status: watch::Sender<NetworkStatus>,
}

impl NetworkMonitor {
    pub fn new(initial: NetworkStatus) -> Self {
        let (status, _) = watch::channel(initial);
        Self { status }
    }

    pub fn get_status(&self) -> NetworkStatus {
        *self.status.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.get_status() == NetworkStatus::Online
    }

    pub fn set_online(&self) -> bool {
        self.set_status(NetworkStatus::Online)
    }

    pub fn set_offline(&self) -> bool {
        self.set_status(NetworkStatus::Offline)
    }

    /// Record a status report, returning whether it was a transition
    pub fn set_status(&self, status: NetworkStatus) -> bool {
        let changed = self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });

        if changed {
            tracing::info!(?status, "Network status changed");
        }
        changed
    }

    /// Receiver notified on every transition
    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.status.subscribe()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(NetworkStatus::Online)
    }
}
