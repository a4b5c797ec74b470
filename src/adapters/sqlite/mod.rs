//! SQLite adapters for the Cadence stores.

pub mod connection;
pub mod inbox_repository;
pub mod migrations;
pub mod module_config_repository;
pub mod task_repository;
pub mod task_run_repository;
pub mod trigger_state_repository;

pub use connection::{create_memory_pool, create_pool, ConnectionError, PoolConfig};
pub use inbox_repository::SqliteInboxRepository;
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use module_config_repository::SqliteModuleConfigRepository;
pub use task_repository::SqliteTaskRepository;
pub use task_run_repository::SqliteTaskRunRepository;
pub use trigger_state_repository::SqliteTriggerStateRepository;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::DatabaseConfig;

/// Parse a UUID string from a SQLite row field.
pub fn parse_uuid(s: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DomainError::SerializationError(e.to_string()))
}

/// Parse an optional UUID string from a SQLite row field.
pub fn parse_optional_uuid(s: Option<String>) -> DomainResult<Option<Uuid>> {
    s.map(|s| parse_uuid(&s)).transpose()
}

/// Parse an RFC3339 datetime string from a SQLite row field.
pub fn parse_datetime(s: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map_err(|e| DomainError::SerializationError(e.to_string()))
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse an optional RFC3339 datetime string from a SQLite row field.
pub fn parse_optional_datetime(s: Option<String>) -> DomainResult<Option<DateTime<Utc>>> {
    s.map(|s| parse_datetime(&s)).transpose()
}

/// Parse an optional JSON column.
pub fn parse_optional_json<T: serde::de::DeserializeOwned>(
    s: Option<String>,
) -> DomainResult<Option<T>> {
    s.map(|s| serde_json::from_str(&s)).transpose().map_err(DomainError::from)
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
    let pool = create_pool(&config.url(), PoolConfig::from(config)).await?;
    Migrator::new(pool.clone()).run(&all_embedded_migrations()).await?;
    Ok(pool)
}

/// In-memory pool with all migrations applied.
pub async fn create_migrated_memory_pool() -> Result<SqlitePool, DatabaseError> {
    let pool = create_memory_pool().await?;
    Migrator::new(pool.clone()).run(&all_embedded_migrations()).await?;
    Ok(pool)
}
