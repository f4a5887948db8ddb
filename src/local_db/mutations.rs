//! # Mutation Log
//!
//! Persistence for queued mutations. The log is append-only from the queue
//! API's point of view; only the sync manager transitions or removes records.
//!
//! ## Operations
//!
//! - `add_mutation`: assign id and creation time, persist as `pending`
//! - `get_pending_mutations`: every undelivered record, in storage order
//! - `update_mutation_status`: status transition, counting failures
//! - `remove_mutation`: permanent delete, the only path to success
//! - `reset_mutation`: user-initiated retry of a failed record
//! - `rewrite_entity_id`: swap a temp id for the server-assigned id

use crate::local_db::{LocalDatabase, Result};
use crate::shared::mutation::{
    EntityKind, MutationKind, MutationStatus, NewMutation, StoredMutation,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use thiserror::Error;
use uuid::Uuid;

/// A stored record whose entity or kind no longer maps to a remote route
///
/// Surfaced as `sqlx::Error::Decode` so the store keeps a single error type;
/// the sync manager downcasts it into a routing failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("mutation {id} has no remote route for {kind}/{entity}")]
pub struct UnroutableRecord {
    pub id: String,
    pub entity: String,
    pub kind: String,
}

/// Undelivered mutation counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationCounts {
    /// `pending` or `in_progress`
    pub pending: u64,
    /// `failed`
    pub failed: u64,
}

impl MutationCounts {
    /// Every record still in the log
    pub fn total(&self) -> u64 {
        self.pending + self.failed
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, kind, entity, entity_id, data, status, retries, last_error, created_at FROM mutations";

impl LocalDatabase {
    /// Queue a mutation
    ///
    /// Returns once the record is durable.
    pub async fn add_mutation(&self, mutation: NewMutation) -> Result<StoredMutation> {
        let stored = StoredMutation {
            id: Uuid::new_v4().to_string(),
            kind: mutation.kind,
            entity: mutation.entity,
            entity_id: mutation.entity_id,
            data: mutation.data,
            status: MutationStatus::Pending,
            retries: 0,
            last_error: None,
            created_at: self.next_timestamp(),
        };
        self.insert_mutation(&stored).await?;
        Ok(stored)
    }

    /// Persist a fully-formed record, used when the caller already holds the
    /// creation timestamp (for example when it also keyed a temp id on it)
    pub async fn insert_mutation(&self, stored: &StoredMutation) -> Result<()> {
        let data = serde_json::to_string(&stored.data).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        sqlx::query(
            "INSERT INTO mutations (id, kind, entity, entity_id, data, status, retries, last_error, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&stored.id)
        .bind(stored.kind.as_str())
        .bind(stored.entity.as_str())
        .bind(&stored.entity_id)
        .bind(data)
        .bind(stored.status.as_str())
        .bind(stored.retries as i64)
        .bind(&stored.last_error)
        .bind(stored.created_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            id = %stored.id,
            route = %format!("{}/{}", stored.kind, stored.entity),
            entity_id = %stored.entity_id,
            "Mutation queued"
        );
        Ok(())
    }

    /// Every record still in the log, in storage order
    ///
    /// Includes `failed` records. Callers replaying the log sort by `created_at`.
    pub async fn get_pending_mutations(&self) -> Result<Vec<StoredMutation>> {
        let rows = sqlx::query(SELECT_COLUMNS).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_mutation).collect()
    }

    /// Look up a single record
    pub async fn get_mutation(&self, id: &str) -> Result<Option<StoredMutation>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_mutation).transpose()
    }

    /// Transition a record's status
    ///
    /// Passing an error marks a failed attempt: `retries` is incremented and
    /// the message stored. Without an error only the status changes.
    pub async fn update_mutation_status(
        &self,
        id: &str,
        status: MutationStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let result = match error {
            Some(message) => {
                sqlx::query(
                    "UPDATE mutations SET status = ?, retries = retries + 1, last_error = ? WHERE id = ?",
                )
                .bind(status.as_str())
                .bind(message)
                .bind(id)
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query("UPDATE mutations SET status = ? WHERE id = ?")
                    .bind(status.as_str())
                    .bind(id)
                    .execute(&self.pool)
                    .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }

    /// Permanently delete a record
    pub async fn remove_mutation(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM mutations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Put a record back to `pending` with a fresh retry budget
    pub async fn reset_mutation(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE mutations SET status = 'pending', retries = 0, last_error = NULL WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace `from` with `to` as the target of every queued mutation on `entity`
    pub async fn rewrite_entity_id(&self, entity: EntityKind, from: &str, to: &str) -> Result<u64> {
        let result = sqlx::query("UPDATE mutations SET entity_id = ? WHERE entity = ? AND entity_id = ?")
            .bind(to)
            .bind(entity.as_str())
            .bind(from)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Count undelivered records by status
    pub async fn count_mutations(&self) -> Result<MutationCounts> {
        let row: (i64, i64) = sqlx::query_as(
            "SELECT
                COALESCE(SUM(CASE WHEN status = 'failed' THEN 0 ELSE 1 END), 0),
                COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0)
             FROM mutations",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(MutationCounts {
            pending: row.0 as u64,
            failed: row.1 as u64,
        })
    }

    /// Return records left `in_progress` by an interrupted run to `pending`
    pub async fn recover_in_progress(&self) -> Result<u64> {
        let result = sqlx::query("UPDATE mutations SET status = 'pending' WHERE status = 'in_progress'")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_mutation(row: &SqliteRow) -> Result<StoredMutation> {
    let id: String = row.try_get("id")?;
    let kind_text: String = row.try_get("kind")?;
    let entity_text: String = row.try_get("entity")?;

    let unroutable = || {
        sqlx::Error::Decode(Box::new(UnroutableRecord {
            id: id.clone(),
            entity: entity_text.clone(),
            kind: kind_text.clone(),
        }))
    };
    let kind: MutationKind = kind_text.parse().map_err(|_| unroutable())?;
    let entity: EntityKind = entity_text.parse().map_err(|_| unroutable())?;

    let status_text: String = row.try_get("status")?;
    let status: MutationStatus = status_text
        .parse()
        .map_err(|s: String| sqlx::Error::Decode(format!("unknown mutation status '{}'", s).into()))?;

    let data_text: String = row.try_get("data")?;
    let data = serde_json::from_str(&data_text).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    let retries: i64 = row.try_get("retries")?;

    Ok(StoredMutation {
        id,
        kind,
        entity,
        entity_id: row.try_get("entity_id")?,
        data,
        status,
        retries: retries.max(0) as u32,
        last_error: row.try_get("last_error")?,
        created_at: row.try_get("created_at")?,
    })
}
