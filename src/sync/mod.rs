//! # Sync Manager
//!
//! Drains the mutation log against the remote API. Every trigger (queue
//! calls, online transitions, the periodic timer, background sync, the app
//! itself) funnels into [`SyncManager::drain`], which is single-flight.
//!
//! ## Architecture
//!
//! - **Sync Manager**: ordered replay with per-mutation retries
//! - **Sync State**: observable progress for the UI (`sync_state.rs`)
//! - **Network Monitor**: connectivity reported by the host (`network_monitor.rs`)
//! - **Scheduler**: connectivity, periodic and background triggers (`scheduler.rs`)
//! - **Background**: host hook for deferred background sync (`background.rs`)
//!
//! ## A Drain Pass
//!
//! 1. Skip if another pass is running or the client is offline
//! 2. Load every record that is not `failed`, oldest `created_at` first
//! 3. Deliver one at a time; a failing record is retried in place with
//!    backoff until it succeeds, exhausts its budget or the client goes offline
//! 4. Record `lastSyncAt` and publish the final state
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldsync::engine::OfflineEngine;
//! use fieldsync::shared::AppConfig;
//!
//! # async fn example() -> Result<(), fieldsync::shared::SyncError> {
//! let engine = OfflineEngine::open(AppConfig::default()).await?;
//! let outcome = engine.sync_manager().drain().await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

pub mod background;
pub mod network_monitor;
pub mod scheduler;
pub mod sync_state;

pub use background::{BackgroundSyncRegistrar, NoopRegistrar};
pub use network_monitor::{NetworkMonitor, NetworkStatus};
pub use scheduler::ConnectivityTriggers;
pub use sync_state::{Subscription, SyncState, SyncStateStore, SyncStatus};

use crate::api_client::RemoteApi;
use crate::local_db::{LocalDatabase, UnroutableRecord};
use crate::offline::retry::RetryPolicy;
use crate::offline::routing;
use crate::shared::error::SyncError;
use crate::shared::mutation::{EntityKind, MutationKind, MutationStatus, StoredMutation};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Handle to a detached drain pass
pub type DrainHandle = JoinHandle<Result<DrainOutcome, SyncError>>;

/// Why a drain call did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another pass holds the guard
    AlreadyRunning,
    /// The network monitor reports offline
    Offline,
}

/// Why a pass stopped before reaching the end of the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    /// The client went offline mid-pass
    WentOffline,
    /// A local store operation failed
    Storage(String),
}

/// Summary of one completed pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Mutations delivered and removed from the log
    pub delivered: usize,
    /// Mutations that became `failed` during this pass
    pub failed: usize,
    /// Set when the pass stopped early
    pub halted: Option<HaltReason>,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.halted.is_none()
    }
}

/// Result of a drain call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    Skipped(SkipReason),
    Completed(DrainReport),
}

/// Records re-queued by a user-initiated retry
#[derive(Debug)]
pub struct Requeued {
    /// Number of records put back to `pending`
    pub count: u64,
    /// Drain kicked for them, if the client is online
    pub drain: Option<DrainHandle>,
}

enum Delivery {
    /// Removed from the log; carries the server-assigned id of a create
    Delivered(Option<String>),
    /// Retry budget exhausted, now `failed`
    Failed,
    /// Went offline while waiting to retry; record left `pending`
    Interrupted,
    /// Removed from the log by someone else during the pass
    Discarded,
}

/// Owner of the drain loop
pub struct SyncManager {
    db: Arc<LocalDatabase>,
    api: Arc<dyn RemoteApi>,
    network: Arc<NetworkMonitor>,
    state: Arc<SyncStateStore>,
    policy: RetryPolicy,
    /// Single-flight guard, only ever acquired with `try_lock`
    drain_lock: Mutex<()>,
    reports: watch::Sender<DrainReport>,
}

impl std::fmt::Debug for SyncManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncManager")
            .field("state", &self.state)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl SyncManager {
    /// Build a manager whose initial state reflects what is already stored
    pub async fn new(
        db: Arc<LocalDatabase>,
        api: Arc<dyn RemoteApi>,
        network: Arc<NetworkMonitor>,
        policy: RetryPolicy,
    ) -> Result<Arc<Self>, SyncError> {
        let counts = db.count_mutations().await?;
        let last_sync_at = db.get_last_sync_at().await?;

        let state = Arc::new(SyncStateStore::new(SyncState {
            pending_count: counts.total(),
            failed_count: counts.failed,
            last_sync_at,
            ..SyncState::default()
        }));
        let (reports, _) = watch::channel(DrainReport::default());

        Ok(Arc::new(Self {
            db,
            api,
            network,
            state,
            policy,
            drain_lock: Mutex::new(()),
            reports,
        }))
    }

    pub fn state(&self) -> &Arc<SyncStateStore> {
        &self.state
    }

    pub fn network(&self) -> &Arc<NetworkMonitor> {
        &self.network
    }

    pub fn database(&self) -> &Arc<LocalDatabase> {
        &self.db
    }

    /// Receiver updated with the report of every completed pass
    pub fn drain_reports(&self) -> watch::Receiver<DrainReport> {
        self.reports.subscribe()
    }

    /// Wait until no pass is running
    ///
    /// Passes started after this returns are not waited for.
    pub async fn wait_idle(&self) {
        let _guard = self.drain_lock.lock().await;
    }

    /// Run a drain pass on a detached task
    pub fn spawn_drain(self: &Arc<Self>) -> DrainHandle {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let result = manager.drain().await;
            if let Err(err) = &result {
                tracing::error!("Sync pass failed: {}", err);
            }
            result
        })
    }

    /// Deliver every pending mutation in creation order
    ///
    /// Returns `Err` only for records that can never be routed; delivery and
    /// storage problems end up in the report and in [`SyncState`].
    pub async fn drain(&self) -> Result<DrainOutcome, SyncError> {
        let Ok(_guard) = self.drain_lock.try_lock() else {
            tracing::debug!("Sync pass already running, skipping");
            return Ok(DrainOutcome::Skipped(SkipReason::AlreadyRunning));
        };
        if !self.network.is_online() {
            tracing::debug!("Offline, skipping sync pass");
            return Ok(DrainOutcome::Skipped(SkipReason::Offline));
        }

        tracing::info!("Sync pass started");
        self.state.update(|state| {
            state.status = SyncStatus::Syncing;
            state.error = None;
        });

        let mut report = DrainReport::default();
        let queue = match self.load_queue().await {
            Ok(queue) => queue,
            Err(err @ SyncError::UnknownRoute { .. }) => {
                tracing::error!("Sync pass aborted: {}", err);
                let message = err.to_string();
                self.state.update(|state| {
                    state.status = SyncStatus::Error;
                    state.error = Some(message);
                });
                return Err(err);
            }
            Err(err) => {
                report.halted = Some(HaltReason::Storage(err.to_string()));
                Vec::new()
            }
        };

        if report.halted.is_none() {
            if let Err(err) = self.replay(queue, &mut report).await {
                report.halted = Some(HaltReason::Storage(err.to_string()));
            }
        }

        self.finish(&report).await;
        Ok(DrainOutcome::Completed(report))
    }

    async fn load_queue(&self) -> Result<Vec<StoredMutation>, SyncError> {
        let mut queue: Vec<StoredMutation> = self
            .db
            .get_pending_mutations()
            .await
            .map_err(classify_store_error)?
            .into_iter()
            .filter(|mutation| mutation.status != MutationStatus::Failed)
            .collect();
        queue.sort_by_key(|mutation| mutation.created_at);
        Ok(queue)
    }

    async fn replay(&self, mut queue: Vec<StoredMutation>, report: &mut DrainReport) -> Result<(), SyncError> {
        tracing::debug!(count = queue.len(), "Replaying mutation log");

        for index in 0..queue.len() {
            if !self.network.is_online() {
                tracing::info!("Went offline, stopping sync pass");
                report.halted = Some(HaltReason::WentOffline);
                return Ok(());
            }

            let (done, rest) = queue.split_at_mut(index + 1);
            let mutation = &mut done[index];

            if self.policy.is_exhausted(mutation.retries) {
                self.mark_exhausted(mutation).await?;
                report.failed += 1;
                self.refresh_counts().await?;
                continue;
            }

            match self.deliver(mutation).await? {
                Delivery::Delivered(created_id) => {
                    report.delivered += 1;
                    if let Some(real_id) = created_id {
                        if mutation.kind == MutationKind::Create && mutation.has_temp_id() {
                            self.reconcile_temp_id(mutation.entity, &mutation.entity_id, &real_id, rest)
                                .await?;
                        }
                    }
                }
                Delivery::Failed => report.failed += 1,
                Delivery::Discarded => {}
                Delivery::Interrupted => {
                    tracing::info!("Went offline, stopping sync pass");
                    report.halted = Some(HaltReason::WentOffline);
                    self.refresh_counts().await?;
                    return Ok(());
                }
            }

            self.refresh_counts().await?;
        }
        Ok(())
    }

    /// Deliver one mutation, retrying in place
    async fn deliver(&self, mutation: &mut StoredMutation) -> Result<Delivery, SyncError> {
        loop {
            mutation.status = MutationStatus::InProgress;
            match self
                .db
                .update_mutation_status(&mutation.id, MutationStatus::InProgress, None)
                .await
            {
                Err(sqlx::Error::RowNotFound) => return Ok(Delivery::Discarded),
                other => other?,
            }

            let request = routing::route(mutation);
            tracing::debug!(id = %mutation.id, %request, attempt = mutation.retries + 1, "Delivering mutation");

            let attempt = match self.api.send(&request).await {
                Ok(response) => response.into_result(),
                Err(err) => Err(err),
            };

            let error = match attempt {
                Ok(response) => {
                    self.db.remove_mutation(&mutation.id).await?;
                    tracing::debug!(id = %mutation.id, %request, "Mutation delivered");
                    return Ok(Delivery::Delivered(response.created_id()));
                }
                Err(error) => error,
            };

            let message = error.to_string();
            mutation.retries += 1;
            mutation.last_error = Some(message.clone());
            let exhausted = self.policy.is_exhausted(mutation.retries);
            mutation.status = if exhausted {
                MutationStatus::Failed
            } else {
                MutationStatus::Pending
            };

            match self
                .db
                .update_mutation_status(&mutation.id, mutation.status, Some(&message))
                .await
            {
                Err(sqlx::Error::RowNotFound) => return Ok(Delivery::Discarded),
                other => other?,
            }

            if exhausted {
                tracing::warn!(
                    id = %mutation.id,
                    %request,
                    retries = mutation.retries,
                    "Mutation failed permanently: {}",
                    message
                );
                return Ok(Delivery::Failed);
            }

            let delay = self.policy.delay(mutation.retries);
            tracing::warn!(
                id = %mutation.id,
                %request,
                retries = mutation.retries,
                ?delay,
                "Delivery failed, retrying: {}",
                message
            );
            tokio::time::sleep(delay).await;

            if !self.network.is_online() {
                return Ok(Delivery::Interrupted);
            }
        }
    }

    /// A pending record whose budget was already used up, e.g. after the
    /// configured maximum was lowered
    async fn mark_exhausted(&self, mutation: &mut StoredMutation) -> Result<(), SyncError> {
        mutation.status = MutationStatus::Failed;
        match self
            .db
            .update_mutation_status(&mutation.id, MutationStatus::Failed, None)
            .await
        {
            Err(sqlx::Error::RowNotFound) | Ok(()) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Point everything that referenced `temp_id` at the server-assigned id
    async fn reconcile_temp_id(
        &self,
        entity: EntityKind,
        temp_id: &str,
        real_id: &str,
        rest: &mut [StoredMutation],
    ) -> Result<(), SyncError> {
        let rewritten = self.db.rewrite_entity_id(entity, temp_id, real_id).await?;
        self.db.rename_cached_entity(entity, temp_id, real_id).await?;
        self.db.rewrite_draft_entity_id(temp_id, real_id).await?;

        for later in rest
            .iter_mut()
            .filter(|later| later.entity == entity && later.entity_id == temp_id)
        {
            later.entity_id = real_id.to_string();
        }

        tracing::debug!(%entity, temp_id, real_id, rewritten, "Temp id reconciled");
        Ok(())
    }

    async fn finish(&self, report: &DrainReport) {
        let mut storage_error = match &report.halted {
            Some(HaltReason::Storage(message)) => Some(message.clone()),
            _ => None,
        };

        if storage_error.is_none() {
            let now = Utc::now();
            match self.db.set_last_sync_at(now).await {
                Ok(()) => self.state.update(|state| state.last_sync_at = Some(now)),
                Err(err) => storage_error = Some(SyncError::from(err).to_string()),
            }
        }
        if let Err(err) = self.refresh_counts().await {
            storage_error.get_or_insert(err.to_string());
        }

        match &storage_error {
            Some(message) => tracing::error!("Sync pass ended on storage error: {}", message),
            None => tracing::info!(
                delivered = report.delivered,
                failed = report.failed,
                halted = report.halted.is_some(),
                "Sync pass finished"
            ),
        }

        let error = storage_error.or_else(|| {
            (report.failed > 0).then(|| match report.failed {
                1 => "1 change failed to sync".to_string(),
                n => format!("{} changes failed to sync", n),
            })
        });
        self.state.update(|state| {
            state.status = if error.is_some() {
                SyncStatus::Error
            } else {
                SyncStatus::Idle
            };
            state.error = error;
        });

        self.reports.send_replace(report.clone());
    }

    /// Republish the pending and failed counts from the store
    pub async fn refresh_counts(&self) -> Result<(), SyncError> {
        let counts = self.db.count_mutations().await?;
        self.state.update(|state| {
            state.pending_count = counts.total();
            state.failed_count = counts.failed;
        });
        Ok(())
    }

    /// Give a `failed` mutation a fresh retry budget and kick a drain
    pub async fn retry_failed(self: &Arc<Self>, id: &str) -> Result<Requeued, SyncError> {
        let count = match self.db.get_mutation(id).await.map_err(classify_store_error)? {
            Some(mutation) if mutation.status == MutationStatus::Failed => {
                u64::from(self.db.reset_mutation(id).await?)
            }
            _ => 0,
        };
        self.requeued(count).await
    }

    /// [`retry_failed`](Self::retry_failed) for every failed mutation
    pub async fn retry_all_failed(self: &Arc<Self>) -> Result<Requeued, SyncError> {
        let mut count = 0;
        for mutation in self.db.get_pending_mutations().await.map_err(classify_store_error)? {
            if mutation.status == MutationStatus::Failed && self.db.reset_mutation(&mutation.id).await? {
                count += 1;
            }
        }
        self.requeued(count).await
    }

    async fn requeued(self: &Arc<Self>, count: u64) -> Result<Requeued, SyncError> {
        if count == 0 {
            return Ok(Requeued { count, drain: None });
        }
        tracing::info!(count, "Failed mutations requeued");
        self.refresh_counts().await?;

        let drain = self.network.is_online().then(|| self.spawn_drain());
        Ok(Requeued { count, drain })
    }

    /// Drop a mutation from the log without delivering it
    pub async fn discard(&self, id: &str) -> Result<bool, SyncError> {
        let removed = self.db.remove_mutation(id).await?;
        if removed {
            tracing::info!(id, "Mutation discarded");
            self.refresh_counts().await?;
        }
        Ok(removed)
    }
}

/// Surface unroutable records as routing errors rather than storage errors
fn classify_store_error(err: sqlx::Error) -> SyncError {
    if let sqlx::Error::Decode(source) = &err {
        if let Some(record) = source.downcast_ref::<UnroutableRecord>() {
            return SyncError::unknown_route(record.entity.clone(), record.kind.clone());
        }
    }
    SyncError::Storage(err)
}
