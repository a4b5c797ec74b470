//! SQLite adapter for TaskRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{
    parse_datetime, parse_optional_datetime, parse_optional_json, parse_uuid,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Task, TriggerKind};
use crate::domain::ports::task_repository::{TaskFilter, TaskRepository};

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    name: String,
    description: String,
    trigger_type: String,
    trigger_config: String,
    action_prompt: String,
    tools_filter: Option<String>,
    is_active: bool,
    last_run_at: Option<String>,
    next_run_at: Option<String>,
    created_at: String,
}

fn row_to_task(row: TaskRow) -> DomainResult<Task> {
    Ok(Task {
        id: parse_uuid(&row.id)?,
        name: row.name,
        description: row.description,
        trigger_type: TriggerKind::from_str(&row.trigger_type),
        trigger_config: row.trigger_config,
        action_prompt: row.action_prompt,
        tools_filter: parse_optional_json(row.tools_filter)?,
        is_active: row.is_active,
        last_run_at: parse_optional_datetime(row.last_run_at)?,
        next_run_at: parse_optional_datetime(row.next_run_at)?,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: &Task) -> DomainResult<()> {
        let tools = task.tools_filter.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            "INSERT INTO tasks
             (id, name, description, trigger_type, trigger_config, action_prompt,
              tools_filter, is_active, last_run_at, next_run_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(task.id.to_string())
        .bind(&task.name)
        .bind(&task.description)
        .bind(task.trigger_type.as_str())
        .bind(&task.trigger_config)
        .bind(&task.action_prompt)
        .bind(&tools)
        .bind(task.is_active)
        .bind(task.last_run_at.map(|dt| dt.to_rfc3339()))
        .bind(task.next_run_at.map(|dt| dt.to_rfc3339()))
        .bind(task.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_task).transpose()
    }

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_task).transpose()
    }

    async fn update(&self, task: &Task) -> DomainResult<()> {
        let tools = task.tools_filter.as_ref().map(serde_json::to_string).transpose()?;

        let result = sqlx::query(
            "UPDATE tasks SET
             name = ?2, description = ?3, trigger_type = ?4, trigger_config = ?5,
             action_prompt = ?6, tools_filter = ?7, is_active = ?8,
             last_run_at = ?9, next_run_at = ?10
             WHERE id = ?1",
        )
        .bind(task.id.to_string())
        .bind(&task.name)
        .bind(&task.description)
        .bind(task.trigger_type.as_str())
        .bind(&task.trigger_config)
        .bind(&task.action_prompt)
        .bind(&tools)
        .bind(task.is_active)
        .bind(task.last_run_at.map(|dt| dt.to_rfc3339()))
        .bind(task.next_run_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TaskNotFound(task.id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self, filter: TaskFilter) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT * FROM tasks
             WHERE (?1 IS NULL OR trigger_type = ?1)
               AND (?2 IS NULL OR is_active = ?2)
             ORDER BY created_at ASC",
        )
        .bind(filter.trigger_type.as_ref().map(TriggerKind::as_str))
        .bind(filter.active)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_task).collect()
    }

    async fn list_active(&self, trigger_type: Option<&TriggerKind>) -> DomainResult<Vec<Task>> {
        self.list(TaskFilter {
            trigger_type: trigger_type.cloned(),
            active: Some(true),
        })
        .await
    }

    async fn record_last_run(&self, id: Uuid, at: DateTime<Utc>) -> DomainResult<()> {
        sqlx::query("UPDATE tasks SET last_run_at = ? WHERE id = ?")
            .bind(at.to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_next_run(&self, id: Uuid, at: Option<DateTime<Utc>>) -> DomainResult<()> {
        sqlx::query("UPDATE tasks SET next_run_at = ? WHERE id = ?")
            .bind(at.map(|dt| dt.to_rfc3339()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
