//! Engine bookkeeping stored as flat key/value pairs.

use crate::local_db::entities::decode_time;
use crate::local_db::{LocalDatabase, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;

/// Metadata key holding the time of the last completed drain
pub const LAST_SYNC_AT: &str = "lastSyncAt";

impl LocalDatabase {
    /// Set a metadata value
    pub async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO sync_metadata (key, value, updated_at)
             VALUES (?, ?, ?)",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get a metadata value
    pub async fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM sync_metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    /// Time of the last completed drain
    pub async fn get_last_sync_at(&self) -> Result<Option<DateTime<Utc>>> {
        match self.get_metadata(LAST_SYNC_AT).await? {
            Some(value) => Ok(Some(decode_time(&value)?)),
            None => Ok(None),
        }
    }

    /// Record the time of a completed drain
    pub async fn set_last_sync_at(&self, at: DateTime<Utc>) -> Result<()> {
        self.set_metadata(LAST_SYNC_AT, &at.to_rfc3339()).await
    }
}
