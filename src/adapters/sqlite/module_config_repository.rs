//! SQLite adapter for ModuleConfigRepository.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::trigger_state_repository::ModuleConfigRepository;

#[derive(Clone)]
pub struct SqliteModuleConfigRepository {
    pool: SqlitePool,
}

impl SqliteModuleConfigRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ModuleConfigRepository for SqliteModuleConfigRepository {
    async fn get(&self, module_id: &str) -> DomainResult<Option<Value>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT config FROM module_configs WHERE module_id = ?")
                .bind(module_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(config,)| serde_json::from_str(&config).map_err(DomainError::from))
            .transpose()
    }

    async fn put(&self, module_id: &str, config: &Value) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO module_configs (module_id, config, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(module_id) DO UPDATE
             SET config = excluded.config, updated_at = excluded.updated_at",
        )
        .bind(module_id)
        .bind(config.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<(String, Value)>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT module_id, config FROM module_configs ORDER BY module_id")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(id, config)| -> DomainResult<(String, Value)> {
                Ok((id, serde_json::from_str(&config)?))
            })
            .collect()
    }
}
