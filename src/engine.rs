//! # Offline Engine
//!
//! Wires the local store, sync manager, queue API and triggers together.
//! Build one per process and share it; everything inside is `Arc`-backed.
//!
//! ## Startup
//!
//! 1. Open the store (migrations, clock seeding, `in_progress` recovery)
//! 2. Build the sync state from what is stored
//! 3. Start the connectivity triggers
//! 4. If online with undelivered mutations, kick a drain
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldsync::engine::OfflineEngine;
//! use fieldsync::shared::AppConfig;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), fieldsync::shared::SyncError> {
//! let config = AppConfig::builder().with_env().build()?;
//! let engine = OfflineEngine::open(config).await?;
//!
//! let _subscription = engine.state().subscribe(|state| {
//!     println!("{} change(s) pending", state.pending_count);
//! });
//!
//! engine.set_offline();
//! engine.queue().queue_job_update("job_1", json!({ "status": "completed" })).await?;
//! engine.set_online();
//! # Ok(())
//! # }
//! ```

use crate::api_client::{HttpRemoteApi, RemoteApi};
use crate::local_db::LocalDatabase;
use crate::offline::retry::RetryPolicy;
use crate::offline::MutationQueue;
use crate::realtime::{Reconnector, SseInboxChannel};
use crate::shared::config::AppConfig;
use crate::shared::error::SyncError;
use crate::sync::{
    BackgroundSyncRegistrar, ConnectivityTriggers, DrainHandle, NetworkMonitor, NetworkStatus,
    NoopRegistrar, SyncManager, SyncStateStore,
};
use std::sync::Arc;

/// The assembled offline sync engine
#[derive(Debug)]
pub struct OfflineEngine {
    config: AppConfig,
    db: Arc<LocalDatabase>,
    network: Arc<NetworkMonitor>,
    manager: Arc<SyncManager>,
    queue: MutationQueue,
    triggers: ConnectivityTriggers,
    startup_drain: Option<DrainHandle>,
}

impl OfflineEngine {
    /// Open the engine against the configured store and server
    ///
    /// Assumes the client starts online; the host corrects this through
    /// [`set_offline`](Self::set_offline).
    pub async fn open(config: AppConfig) -> Result<Self, SyncError> {
        let path = config.database_path();
        tracing::info!("Opening local store at {}", path.display());

        let db = Arc::new(LocalDatabase::open(&path).await?);
        let api = Arc::new(HttpRemoteApi::new(config.clone())?);

        Self::with_parts(config, db, api, Arc::new(NoopRegistrar), NetworkStatus::Online).await
    }

    /// Assemble the engine from explicit parts
    pub async fn with_parts(
        config: AppConfig,
        db: Arc<LocalDatabase>,
        api: Arc<dyn RemoteApi>,
        registrar: Arc<dyn BackgroundSyncRegistrar>,
        initial_status: NetworkStatus,
    ) -> Result<Self, SyncError> {
        let network = Arc::new(NetworkMonitor::new(initial_status));
        let manager = SyncManager::new(
            Arc::clone(&db),
            api,
            Arc::clone(&network),
            RetryPolicy::mutation_delivery(&config),
        )
        .await?;

        let queue = MutationQueue::new(Arc::clone(&manager), registrar);
        let triggers = ConnectivityTriggers::start(Arc::clone(&manager), config.sync_interval);

        let counts = db.count_mutations().await?;
        let startup_drain = (network.is_online() && counts.pending > 0).then(|| {
            tracing::info!(pending = counts.pending, "Resuming delivery of queued mutations");
            manager.spawn_drain()
        });

        Ok(Self {
            config,
            db,
            network,
            manager,
            queue,
            triggers,
            startup_drain,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn database(&self) -> &Arc<LocalDatabase> {
        &self.db
    }

    pub fn queue(&self) -> &MutationQueue {
        &self.queue
    }

    pub fn sync_manager(&self) -> &Arc<SyncManager> {
        &self.manager
    }

    pub fn state(&self) -> &Arc<SyncStateStore> {
        self.manager.state()
    }

    pub fn network(&self) -> &Arc<NetworkMonitor> {
        &self.network
    }

    /// Host reports connectivity; going online triggers a drain
    pub fn set_online(&self) {
        self.network.set_online();
    }

    pub fn set_offline(&self) {
        self.network.set_offline();
    }

    /// Host reports that its deferred background sync fired
    pub fn notify_background_sync_complete(&self) {
        self.triggers.notify_background_sync_complete();
    }

    /// Drain kicked during startup, if there was one
    pub fn take_startup_drain(&mut self) -> Option<DrainHandle> {
        self.startup_drain.take()
    }

    /// Open the inbox live channel with the configured reconnect policy
    pub fn connect_inbox(&self) -> Result<Reconnector, SyncError> {
        let channel = SseInboxChannel::new(self.config.clone())?;
        Ok(Reconnector::spawn(
            Arc::new(channel),
            RetryPolicy::reconnect(&self.config),
        ))
    }

    /// Stop the triggers, wait for a running drain and close the store
    pub async fn shutdown(mut self) {
        self.triggers.stop();
        if let Some(handle) = self.startup_drain.take() {
            let _ = handle.await;
        }
        self.manager.wait_idle().await;
        self.db.close().await;
        tracing::info!("Offline engine stopped");
    }
}
