//! SQLite adapter for InboxRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::adapters::sqlite::{parse_datetime, parse_optional_uuid, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{InboxItem, InboxKind};
use crate::domain::ports::inbox_repository::InboxRepository;

#[derive(Clone)]
pub struct SqliteInboxRepository {
    pool: SqlitePool,
}

impl SqliteInboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct InboxRow {
    id: String,
    title: String,
    content: String,
    kind: String,
    source_run_id: Option<String>,
    task_id: Option<String>,
    failed: bool,
    created_at: String,
}

fn row_to_item(row: InboxRow) -> DomainResult<InboxItem> {
    Ok(InboxItem {
        id: parse_uuid(&row.id)?,
        title: row.title,
        content: row.content,
        kind: InboxKind::from_str(&row.kind).ok_or_else(|| {
            DomainError::SerializationError(format!("unknown inbox kind: {}", row.kind))
        })?,
        source_run_id: parse_optional_uuid(row.source_run_id)?,
        task_id: parse_optional_uuid(row.task_id)?,
        failed: row.failed,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[async_trait]
impl InboxRepository for SqliteInboxRepository {
    async fn create(&self, item: &InboxItem) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO inbox_items
             (id, title, content, kind, source_run_id, task_id, failed, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(item.id.to_string())
        .bind(&item.title)
        .bind(&item.content)
        .bind(item.kind.as_str())
        .bind(item.source_run_id.map(|u| u.to_string()))
        .bind(item.task_id.map(|u| u.to_string()))
        .bind(item.failed)
        .bind(item.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> DomainResult<Vec<InboxItem>> {
        let rows: Vec<InboxRow> =
            sqlx::query_as("SELECT * FROM inbox_items ORDER BY created_at DESC LIMIT ?")
                .bind(i64::try_from(limit).unwrap_or(i64::MAX))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(row_to_item).collect()
    }
}
