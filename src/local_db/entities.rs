//! # Entity Cache
//!
//! Best-effort local mirrors of server objects keyed by `(kind, entity_id)`.
//! Entries may be stale and are overwritten whenever fresher data arrives,
//! either from a fetch or from an optimistic local write.

use crate::local_db::{LocalDatabase, Result};
use crate::shared::mutation::EntityKind;
use chrono::{DateTime, Utc};
use sqlx::Row;

/// A cached server object
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntity {
    pub kind: EntityKind,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl LocalDatabase {
    /// Insert or replace a cached entity
    pub async fn cache_entity(
        &self,
        kind: EntityKind,
        entity_id: &str,
        data: &serde_json::Value,
    ) -> Result<()> {
        let data = serde_json::to_string(data).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        sqlx::query(
            "INSERT OR REPLACE INTO cached_entities (kind, entity_id, data, updated_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(kind.as_str())
        .bind(entity_id)
        .bind(data)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetch a cached entity
    pub async fn get_cached_entity(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Option<CachedEntity>> {
        let row = sqlx::query(
            "SELECT data, updated_at FROM cached_entities WHERE kind = ? AND entity_id = ?",
        )
        .bind(kind.as_str())
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let data: String = row.try_get("data")?;
                let updated_at: String = row.try_get("updated_at")?;
                Ok(Some(CachedEntity {
                    kind,
                    entity_id: entity_id.to_string(),
                    data: decode_json(&data)?,
                    updated_at: decode_time(&updated_at)?,
                }))
            }
            None => Ok(None),
        }
    }

    /// Every cached entity of one kind, most recently updated first
    pub async fn list_cached_entities(&self, kind: EntityKind) -> Result<Vec<CachedEntity>> {
        let rows = sqlx::query(
            "SELECT entity_id, data, updated_at FROM cached_entities
             WHERE kind = ?
             ORDER BY updated_at DESC",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let data: String = row.try_get("data")?;
                let updated_at: String = row.try_get("updated_at")?;
                Ok(CachedEntity {
                    kind,
                    entity_id: row.try_get("entity_id")?,
                    data: decode_json(&data)?,
                    updated_at: decode_time(&updated_at)?,
                })
            })
            .collect()
    }

    /// Shallow-merge `patch` into a cached object
    ///
    /// Returns `false` when nothing is cached for the key. Non-object values
    /// are replaced outright.
    pub async fn merge_cached_entity(
        &self,
        kind: EntityKind,
        entity_id: &str,
        patch: &serde_json::Value,
    ) -> Result<bool> {
        let Some(existing) = self.get_cached_entity(kind, entity_id).await? else {
            return Ok(false);
        };

        let merged = match (existing.data, patch) {
            (serde_json::Value::Object(mut base), serde_json::Value::Object(changes)) => {
                for (key, value) in changes {
                    base.insert(key.clone(), value.clone());
                }
                serde_json::Value::Object(base)
            }
            (_, replacement) => replacement.clone(),
        };

        self.cache_entity(kind, entity_id, &merged).await?;
        Ok(true)
    }

    /// Remove a cached entity
    pub async fn remove_cached_entity(&self, kind: EntityKind, entity_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cached_entities WHERE kind = ? AND entity_id = ?")
            .bind(kind.as_str())
            .bind(entity_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move a cached entity from a temp id to its server id
    pub async fn rename_cached_entity(&self, kind: EntityKind, from: &str, to: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE OR REPLACE cached_entities SET entity_id = ? WHERE kind = ? AND entity_id = ?",
        )
        .bind(to)
        .bind(kind.as_str())
        .bind(from)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub(crate) fn decode_json(text: &str) -> Result<serde_json::Value> {
    serde_json::from_str(text).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

pub(crate) fn decode_time(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}
