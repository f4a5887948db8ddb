//! FieldSync - Offline Mutation Sync Engine
//!
//! FieldSync lets a field-service client keep working without connectivity.
//! User changes to jobs, notes, invoices and customers are recorded as
//! durable mutations in a local SQLite store and replayed against the REST
//! API, in order, whenever the client is online.
//!
//! # Overview
//!
//! - Durable local store: mutation log, entity cache, drafts, metadata
//! - Queue API that records intent immediately and syncs in the background
//! - Single-flight, ordered replay with bounded retries and backoff
//! - Observable sync state for "N changes pending" and failure banners
//! - Live inbox channel with automatic reconnection
//!
//! # Module Structure
//!
//! - **`shared`** - Types shared by every layer
//!   - Mutation model, engine errors, configuration
//!
//! - **`local_db`** - SQLite persistence
//!   - Mutation log, entity cache, drafts, sync metadata, migrations
//!
//! - **`api_client`** - Remote API boundary
//!   - `RemoteApi` trait and the reqwest implementation
//!
//! - **`offline`** - Write path
//!   - Mutation queue, optimistic cache writes, routing, retry policy
//!
//! - **`sync`** - Delivery
//!   - Sync manager, sync state, network monitor, triggers
//!
//! - **`realtime`** - Live channel
//!   - Reconnector and SSE inbox stream
//!
//! - **`engine`** - Assembly of the above behind one handle
//!
//! # Usage
//!
//! ```rust,no_run
//! use fieldsync::engine::OfflineEngine;
//! use fieldsync::shared::AppConfig;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), fieldsync::shared::SyncError> {
//! let engine = OfflineEngine::open(AppConfig::builder().with_env().build()?).await?;
//!
//! let receipt = engine
//!     .queue()
//!     .queue_job_update("job_1", json!({ "status": "completed" }))
//!     .await?;
//!
//! if let Some(drain) = receipt.drain {
//!     let _ = drain.await;
//! }
//! println!("{:?}", engine.state().current());
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! Every component is `Send + Sync` and shared through `Arc`. Drain passes
//! never overlap: the sync manager guards them with a `tokio::sync::Mutex`
//! acquired through `try_lock`.
//!
//! # Error Handling
//!
//! - `sqlx::Result<T>` from raw local store operations
//! - `shared::error::SyncError` from the engine, queue and remote API
//! - `shared::config::ConfigError` from configuration loading

/// Shared types and data structures
pub mod shared;

/// Local SQLite store
pub mod local_db;

/// Remote API boundary
pub mod api_client;

/// Offline write path
pub mod offline;

/// Mutation delivery
pub mod sync;

/// Live channel
pub mod realtime;

/// Engine assembly
pub mod engine;

/// Tracing subscriber setup
pub mod logging;
