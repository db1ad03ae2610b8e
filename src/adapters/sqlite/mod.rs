//! SQLite database adapters for task and requirement storage.

pub mod connection;
pub mod migrations;
pub mod requirement_repository;
pub mod task_repository;

pub use connection::{open_in_memory, open_pool, ConnectionError};
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use requirement_repository::SqliteRequirementRepository;
pub use task_repository::SqliteTaskRepository;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::fmt::Display;
use tracing::debug;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::DatabaseConfig;

fn bad_column(kind: &str, value: &str, err: impl Display) -> DomainError {
    DomainError::SerializationError(format!("Invalid {kind} '{value}': {err}"))
}

pub(crate) fn parse_uuid(s: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| bad_column("uuid", s, e))
}

pub(crate) fn parse_optional_uuid(s: Option<String>) -> DomainResult<Option<Uuid>> {
    s.as_deref().map(parse_uuid).transpose()
}

/// Timestamps are stored as RFC 3339 text.
pub(crate) fn parse_datetime(s: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| bad_column("timestamp", s, e))
}

pub(crate) fn parse_optional_datetime(s: Option<String>) -> DomainResult<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_datetime).transpose()
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
}

/// Open the configured database and bring its schema up to date.
pub async fn initialize_database(config: &DatabaseConfig) -> Result<SqlitePool, DatabaseError> {
    migrate(open_pool(config).await?).await
}

/// A fresh, isolated in-memory database with the schema applied.
pub async fn initialize_in_memory() -> Result<SqlitePool, DatabaseError> {
    migrate(open_in_memory().await?).await
}

async fn migrate(pool: SqlitePool) -> Result<SqlitePool, DatabaseError> {
    let applied = Migrator::new(pool.clone())
        .run_embedded_migrations(all_embedded_migrations())
        .await?;
    debug!(applied, "database ready");
    Ok(pool)
}
