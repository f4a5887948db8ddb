//! # Draft Storage
//!
//! In-progress user input recovered after a restart. Drafts are stored under a
//! caller-chosen id (e.g. `draft_completion_<job_id>`) and looked up by the
//! `(draft_type, entity_id)` pair they belong to. They are independent of the
//! mutation log.

use crate::local_db::entities::{decode_json, decode_time};
use crate::local_db::{LocalDatabase, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// A saved draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    /// Caller-chosen stable id
    pub id: String,
    /// Form or screen the draft belongs to
    pub draft_type: String,
    /// Entity the draft edits
    pub entity_id: String,
    /// Form contents
    pub data: serde_json::Value,
    /// Last save time
    pub updated_at: DateTime<Utc>,
}

impl Draft {
    pub fn new(
        id: impl Into<String>,
        draft_type: impl Into<String>,
        entity_id: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            draft_type: draft_type.into(),
            entity_id: entity_id.into(),
            data,
            updated_at: Utc::now(),
        }
    }
}

impl LocalDatabase {
    /// Insert or replace a draft
    pub async fn save_draft(&self, draft: &Draft) -> Result<()> {
        let data = serde_json::to_string(&draft.data).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        sqlx::query(
            "INSERT OR REPLACE INTO drafts (id, draft_type, entity_id, data, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&draft.id)
        .bind(&draft.draft_type)
        .bind(&draft.entity_id)
        .bind(data)
        .bind(draft.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetch a draft by id
    pub async fn get_draft(&self, id: &str) -> Result<Option<Draft>> {
        let row = sqlx::query(
            "SELECT id, draft_type, entity_id, data, updated_at FROM drafts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_draft).transpose()
    }

    /// Most recently saved draft for an entity
    pub async fn get_draft_by_entity(&self, draft_type: &str, entity_id: &str) -> Result<Option<Draft>> {
        let row = sqlx::query(
            "SELECT id, draft_type, entity_id, data, updated_at FROM drafts
             WHERE draft_type = ? AND entity_id = ?
             ORDER BY updated_at DESC
             LIMIT 1",
        )
        .bind(draft_type)
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_draft).transpose()
    }

    /// Delete a draft
    pub async fn remove_draft(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM drafts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Point drafts at a server id once their temp id has been replaced
    pub async fn rewrite_draft_entity_id(&self, from: &str, to: &str) -> Result<u64> {
        let result = sqlx::query("UPDATE drafts SET entity_id = ? WHERE entity_id = ?")
            .bind(to)
            .bind(from)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_draft(row: &SqliteRow) -> Result<Draft> {
    let data: String = row.try_get("data")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Draft {
        id: row.try_get("id")?,
        draft_type: row.try_get("draft_type")?,
        entity_id: row.try_get("entity_id")?,
        data: decode_json(&data)?,
        updated_at: decode_time(&updated_at)?,
    })
}
