//! # Local Store
//!
//! Durable SQLite storage for the offline engine. Survives restarts and holds
//! four logical collections:
//!
//! - **Mutation Log**: pending/in-progress/failed mutations awaiting delivery
//! - **Entity Cache**: best-effort mirrors of server objects keyed by `(kind, entity_id)`
//! - **Drafts**: in-progress user input, recoverable after a restart
//! - **Metadata**: flat key/value bookkeeping such as the last sync time
//!
//! ## Key Components
//!
//! - `LocalDatabase`: connection pool, schema management, creation clock
//! - `schema.rs`: versioned migrations
//! - `mutations.rs`: the mutation log
//! - `entities.rs`: the entity cache
//! - `drafts.rs`: draft storage
//! - `metadata.rs`: engine bookkeeping
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldsync::local_db::LocalDatabase;
//! use fieldsync::shared::{EntityKind, MutationKind, NewMutation};
//!
//! # async fn example() -> sqlx::Result<()> {
//! let db = LocalDatabase::open("/var/lib/fieldsync/offline.db").await?;
//!
//! let mutation = db.add_mutation(NewMutation {
//!     kind: MutationKind::Update,
//!     entity: EntityKind::Job,
//!     entity_id: "job_1".to_string(),
//!     data: serde_json::json!({ "status": "completed" }),
//! }).await?;
//!
//! let pending = db.get_pending_mutations().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Storage errors are returned as `sqlx::Error` and never swallowed here.

pub mod drafts;
pub mod entities;
pub mod metadata;
pub mod mutations;
pub mod schema;

pub use drafts::Draft;
pub use entities::CachedEntity;
pub use mutations::UnroutableRecord;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Result as SqlxResult, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

/// Result type for local database operations
pub type Result<T> = SqlxResult<T>;

/// Local database connection manager
///
/// Owns the SQLite pool and the creation clock that hands out strictly
/// increasing `created_at` values for queued mutations.
#[derive(Debug)]
pub struct LocalDatabase {
    pool: SqlitePool,
    clock: AtomicI64,
}

impl LocalDatabase {
    /// Open or create the store at `path`
    ///
    /// Creates parent directories and the database file if needed, enables WAL
    /// and applies pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Self::init(pool).await
    }

    /// Open a private in-memory store
    ///
    /// A single connection that never expires keeps the database alive for the
    /// lifetime of the pool.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self> {
        let db = Self {
            pool,
            clock: AtomicI64::new(0),
        };

        db.run_migrations().await?;

        let last_created: (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(created_at), 0) FROM mutations")
                .fetch_one(&db.pool)
                .await?;
        db.clock.store(last_created.0, Ordering::SeqCst);

        let recovered = db.recover_in_progress().await?;
        if recovered > 0 {
            tracing::info!(recovered, "Requeued mutations interrupted mid-delivery");
        }

        Ok(db)
    }

    /// Apply every migration newer than the recorded schema version
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let applied: (i32,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?;

        for migration in schema::pending_migrations(applied.0) {
            tracing::debug!(version = migration.version, "Applying local schema migration");

            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(migration.sql).execute(&mut *tx).await?;
            sqlx::query(
                "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?, ?, ?)",
            )
            .bind(migration.version)
            .bind(migration.description)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
        }

        Ok(())
    }

    /// Next creation timestamp in milliseconds
    ///
    /// Wall-clock based but strictly greater than every value handed out
    /// before, including values persisted by earlier runs.
    pub fn next_timestamp(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let previous = self
            .clock
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }

    /// Get connection pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Row counts per collection, for diagnostics
    pub async fn get_stats(&self) -> Result<DatabaseStats> {
        let counts = self.count_mutations().await?;

        let cached_entities: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cached_entities")
            .fetch_one(&self.pool)
            .await?;

        let drafts: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM drafts")
            .fetch_one(&self.pool)
            .await?;

        Ok(DatabaseStats {
            pending_mutations: counts.pending,
            failed_mutations: counts.failed,
            cached_entities: cached_entities.0 as u64,
            drafts: drafts.0 as u64,
        })
    }

    /// Close the pool, flushing WAL state
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Mutations not yet delivered and not failed
    pub pending_mutations: u64,
    /// Mutations that exhausted their retries
    pub failed_mutations: u64,
    /// Cached entity rows
    pub cached_entities: u64,
    /// Saved drafts
    pub drafts: u64,
}
