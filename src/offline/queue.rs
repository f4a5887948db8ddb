//! # Mutation Queue
//!
//! The write path used by the UI. Every call persists a mutation, mirrors it
//! into the entity cache, asks the host for a background sync and, when the
//! client is online, kicks a detached drain.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldsync::engine::OfflineEngine;
//! use fieldsync::shared::AppConfig;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), fieldsync::shared::SyncError> {
//! let engine = OfflineEngine::open(AppConfig::default()).await?;
//! let queue = engine.queue();
//!
//! let note = queue.queue_note_create("job_1", "Replaced the valve").await?;
//! queue.queue_note_update(&note.entity_id, "job_1", "Replaced the valve and seal").await?;
//! queue.queue_job_update("job_1", json!({ "status": "completed" })).await?;
//! # Ok(())
//! # }
//! ```

use crate::local_db::LocalDatabase;
use crate::offline::optimistic;
use crate::shared::error::SyncError;
use crate::shared::mutation::{
    temp_id, EntityKind, MutationKind, MutationStatus, StoredMutation,
};
use crate::sync::background::{BackgroundSyncRegistrar, SYNC_TAG};
use crate::sync::{DrainHandle, SyncManager};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Per-call queue options
#[derive(Debug, Clone, Copy)]
pub struct QueueOptions {
    /// Kick a drain right away when online
    pub sync_immediately: bool,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            sync_immediately: true,
        }
    }
}

impl QueueOptions {
    /// Queue only; leave delivery to the next trigger
    pub fn deferred() -> Self {
        Self {
            sync_immediately: false,
        }
    }
}

/// What a queue call hands back once the mutation is durable
#[derive(Debug)]
pub struct QueueReceipt {
    pub mutation_id: String,
    /// Target entity id; a temp id for creates
    pub entity_id: String,
    /// Drain kicked by this call, if any
    pub drain: Option<DrainHandle>,
}

/// Write API for queued mutations
pub struct MutationQueue {
    db: Arc<LocalDatabase>,
    manager: Arc<SyncManager>,
    registrar: Arc<dyn BackgroundSyncRegistrar>,
}

impl std::fmt::Debug for MutationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationQueue").finish_non_exhaustive()
    }
}

impl MutationQueue {
    pub fn new(manager: Arc<SyncManager>, registrar: Arc<dyn BackgroundSyncRegistrar>) -> Self {
        Self {
            db: Arc::clone(manager.database()),
            manager,
            registrar,
        }
    }

    /// Queue a create; a temp id is minted for the new entity
    pub async fn queue_create(
        &self,
        entity: EntityKind,
        data: Value,
        options: QueueOptions,
    ) -> Result<QueueReceipt, SyncError> {
        let created_at = self.db.next_timestamp();
        self.enqueue(MutationKind::Create, entity, temp_id(created_at), data, created_at, options)
            .await
    }

    pub async fn queue_update(
        &self,
        entity: EntityKind,
        entity_id: &str,
        data: Value,
        options: QueueOptions,
    ) -> Result<QueueReceipt, SyncError> {
        let created_at = self.db.next_timestamp();
        self.enqueue(MutationKind::Update, entity, entity_id.to_string(), data, created_at, options)
            .await
    }

    pub async fn queue_delete(
        &self,
        entity: EntityKind,
        entity_id: &str,
        options: QueueOptions,
    ) -> Result<QueueReceipt, SyncError> {
        let created_at = self.db.next_timestamp();
        self.enqueue(
            MutationKind::Delete,
            entity,
            entity_id.to_string(),
            json!({}),
            created_at,
            options,
        )
        .await
    }

    async fn enqueue(
        &self,
        kind: MutationKind,
        entity: EntityKind,
        entity_id: String,
        data: Value,
        created_at: i64,
        options: QueueOptions,
    ) -> Result<QueueReceipt, SyncError> {
        let mutation = StoredMutation {
            id: Uuid::new_v4().to_string(),
            kind,
            entity,
            entity_id,
            data,
            status: MutationStatus::Pending,
            retries: 0,
            last_error: None,
            created_at,
        };
        self.db.insert_mutation(&mutation).await?;

        if let Err(err) = optimistic::apply(&self.db, &mutation).await {
            tracing::warn!(id = %mutation.id, "Optimistic cache write failed: {}", err);
        }
        if let Err(err) = self.registrar.request_sync(SYNC_TAG) {
            tracing::warn!("Background sync registration failed: {}", err);
        }
        if let Err(err) = self.manager.refresh_counts().await {
            tracing::warn!(id = %mutation.id, "Queued mutation but could not refresh counts: {}", err);
        }

        let drain = (options.sync_immediately && self.manager.network().is_online())
            .then(|| self.manager.spawn_drain());

        Ok(QueueReceipt {
            mutation_id: mutation.id,
            entity_id: mutation.entity_id,
            drain,
        })
    }

    pub async fn queue_job_create(&self, data: Value) -> Result<QueueReceipt, SyncError> {
        self.queue_create(EntityKind::Job, data, QueueOptions::default()).await
    }

    pub async fn queue_job_update(&self, job_id: &str, data: Value) -> Result<QueueReceipt, SyncError> {
        self.queue_update(EntityKind::Job, job_id, data, QueueOptions::default())
            .await
    }

    pub async fn queue_job_delete(&self, job_id: &str) -> Result<QueueReceipt, SyncError> {
        self.queue_delete(EntityKind::Job, job_id, QueueOptions::default()).await
    }

    pub async fn queue_note_create(&self, job_id: &str, content: &str) -> Result<QueueReceipt, SyncError> {
        self.queue_create(EntityKind::Note, note_body(job_id, content), QueueOptions::default())
            .await
    }

    pub async fn queue_note_update(
        &self,
        note_id: &str,
        job_id: &str,
        content: &str,
    ) -> Result<QueueReceipt, SyncError> {
        self.queue_update(
            EntityKind::Note,
            note_id,
            note_body(job_id, content),
            QueueOptions::default(),
        )
        .await
    }

    pub async fn queue_note_delete(&self, note_id: &str) -> Result<QueueReceipt, SyncError> {
        self.queue_delete(EntityKind::Note, note_id, QueueOptions::default()).await
    }

    pub async fn queue_invoice_create(&self, data: Value) -> Result<QueueReceipt, SyncError> {
        self.queue_create(EntityKind::Invoice, data, QueueOptions::default()).await
    }

    pub async fn queue_invoice_update(&self, invoice_id: &str, data: Value) -> Result<QueueReceipt, SyncError> {
        self.queue_update(EntityKind::Invoice, invoice_id, data, QueueOptions::default())
            .await
    }

    pub async fn queue_invoice_delete(&self, invoice_id: &str) -> Result<QueueReceipt, SyncError> {
        self.queue_delete(EntityKind::Invoice, invoice_id, QueueOptions::default())
            .await
    }

    pub async fn queue_customer_create(&self, data: Value) -> Result<QueueReceipt, SyncError> {
        self.queue_create(EntityKind::Customer, data, QueueOptions::default()).await
    }

    pub async fn queue_customer_update(&self, customer_id: &str, data: Value) -> Result<QueueReceipt, SyncError> {
        self.queue_update(EntityKind::Customer, customer_id, data, QueueOptions::default())
            .await
    }

    pub async fn queue_customer_delete(&self, customer_id: &str) -> Result<QueueReceipt, SyncError> {
        self.queue_delete(EntityKind::Customer, customer_id, QueueOptions::default())
            .await
    }
}

fn note_body(job_id: &str, content: &str) -> Value {
    json!({ "jobId": job_id, "content": content })
}
