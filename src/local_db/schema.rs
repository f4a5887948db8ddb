//! Database Schema Definitions
//!
//! Versioned migrations for the local store. Each migration runs once, inside
//! a transaction, and is recorded in `schema_migrations`.

/// A single schema step
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Monotonic version number
    pub version: i32,
    /// Short description stored alongside the version
    pub description: &'static str,
    /// SQL executed when the migration is applied
    pub sql: &'static str,
}

/// All migrations, in ascending version order
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "mutation log, entity cache, drafts, metadata",
    sql: include_str!("schema.sql"),
}];

/// Latest schema version known to this build
pub fn current_schema_version() -> i32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Migrations newer than `applied_version`
pub fn pending_migrations(applied_version: i32) -> impl Iterator<Item = &'static Migration> {
    MIGRATIONS.iter().filter(move |m| m.version > applied_version)
}
