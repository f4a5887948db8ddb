//! Shared Module
//!
//! Types shared by every layer of the engine: the mutation model, the engine
//! error type and configuration.

/// Mutation records and their closed enums
pub mod mutation;

/// Engine error types
pub mod error;

/// Engine configuration
pub mod config;

pub use config::{AppConfig, AppConfigBuilder, ConfigError};
pub use error::SyncError;
pub use mutation::{EntityKind, MutationKind, MutationStatus, NewMutation, StoredMutation};
