//! Mutation Types
//!
//! The durable record of a locally-issued change that still has to reach the
//! remote API, plus the closed sets of entity kinds, mutation kinds and
//! delivery statuses it is built from.
//!
//! # Lifecycle
//!
//! ```text
//! queued -> Pending -> InProgress -> (delivered: record deleted)
//!                          |
//!                          +-> Pending (retries += 1)
//!                          +-> Failed  (retries == max_retries)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix of client-minted placeholder ids for not-yet-created entities
pub const TEMP_ID_PREFIX: &str = "temp_";

/// Domain entity kinds the engine can route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Field job
    Job,
    /// Note attached to a job
    Note,
    /// Invoice
    Invoice,
    /// Customer record
    Customer,
}

impl EntityKind {
    /// Every entity kind, in declaration order
    pub const ALL: [EntityKind; 4] = [Self::Job, Self::Note, Self::Invoice, Self::Customer];

    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::Note => "note",
            Self::Invoice => "invoice",
            Self::Customer => "customer",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "job" => Ok(Self::Job),
            "note" => Ok(Self::Note),
            "invoice" => Ok(Self::Invoice),
            "customer" => Ok(Self::Customer),
            other => Err(other.to_string()),
        }
    }
}

/// What a mutation does to its entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(other.to_string()),
        }
    }
}

/// Delivery status of a stored mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationStatus {
    /// Waiting for a drain pass
    Pending,
    /// A delivery attempt is running
    InProgress,
    /// Retries exhausted; kept until the user retries or discards it
    Failed,
}

impl MutationStatus {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for MutationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "failed" => Ok(Self::Failed),
            other => Err(other.to_string()),
        }
    }
}

/// Caller-supplied fields of a mutation about to be queued
#[derive(Debug, Clone, PartialEq)]
pub struct NewMutation {
    pub kind: MutationKind,
    pub entity: EntityKind,
    pub entity_id: String,
    pub data: serde_json::Value,
}

/// A durable intent to change server state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMutation {
    /// Opaque id assigned at enqueue time
    pub id: String,
    /// Create, update or delete
    pub kind: MutationKind,
    /// Entity kind the mutation targets
    pub entity: EntityKind,
    /// Server id, or a temp id for creates
    pub entity_id: String,
    /// Payload forwarded verbatim to the remote API
    pub data: serde_json::Value,
    /// Current delivery status
    pub status: MutationStatus,
    /// Failed delivery attempts so far
    pub retries: u32,
    /// Message of the most recent failure
    pub last_error: Option<String>,
    /// Monotonic creation time in milliseconds; the replay ordering key
    pub created_at: i64,
}

impl StoredMutation {
    /// Whether the entity id is a client-minted placeholder
    pub fn has_temp_id(&self) -> bool {
        is_temp_id(&self.entity_id)
    }
}

/// Mint a placeholder id from a creation timestamp
pub fn temp_id(timestamp_ms: i64) -> String {
    format!("{}{}", TEMP_ID_PREFIX, timestamp_ms)
}

/// Whether an id was minted by [`temp_id`]
pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}
