//! SQLite adapter for TaskRunRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{
    parse_datetime, parse_optional_datetime, parse_optional_json, parse_uuid,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{RunStatus, TaskRun};
use crate::domain::ports::task_run_repository::TaskRunRepository;

#[derive(Clone)]
pub struct SqliteTaskRunRepository {
    pool: SqlitePool,
}

impl SqliteTaskRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TaskRunRow {
    id: String,
    task_id: String,
    status: String,
    started_at: String,
    completed_at: Option<String>,
    result: Option<String>,
    error: Option<String>,
    usage: Option<String>,
}

fn row_to_run(row: TaskRunRow) -> DomainResult<TaskRun> {
    let status = RunStatus::from_str(&row.status).ok_or_else(|| {
        DomainError::SerializationError(format!("unknown run status: {}", row.status))
    })?;

    Ok(TaskRun {
        id: parse_uuid(&row.id)?,
        task_id: parse_uuid(&row.task_id)?,
        status,
        started_at: parse_datetime(&row.started_at)?,
        completed_at: parse_optional_datetime(row.completed_at)?,
        result: row.result,
        error: row.error,
        usage: parse_optional_json(row.usage)?,
    })
}

#[async_trait]
impl TaskRunRepository for SqliteTaskRunRepository {
    async fn create(&self, run: &TaskRun) -> DomainResult<()> {
        let usage = run.usage.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            "INSERT INTO task_runs
             (id, task_id, status, started_at, completed_at, result, error, usage)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(run.id.to_string())
        .bind(run.task_id.to_string())
        .bind(run.status.as_str())
        .bind(run.started_at.to_rfc3339())
        .bind(run.completed_at.map(|dt| dt.to_rfc3339()))
        .bind(&run.result)
        .bind(&run.error)
        .bind(&usage)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, run: &TaskRun) -> DomainResult<()> {
        let usage = run.usage.as_ref().map(serde_json::to_string).transpose()?;

        let result = sqlx::query(
            "UPDATE task_runs SET
             status = ?2, completed_at = ?3, result = ?4, error = ?5, usage = ?6
             WHERE id = ?1",
        )
        .bind(run.id.to_string())
        .bind(run.status.as_str())
        .bind(run.completed_at.map(|dt| dt.to_rfc3339()))
        .bind(&run.result)
        .bind(&run.error)
        .bind(&usage)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TaskRunNotFound(run.id));
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<TaskRun>> {
        let row: Option<TaskRunRow> = sqlx::query_as("SELECT * FROM task_runs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_run).transpose()
    }

    async fn list_for_task(&self, task_id: Uuid, limit: usize) -> DomainResult<Vec<TaskRun>> {
        let rows: Vec<TaskRunRow> = sqlx::query_as(
            "SELECT * FROM task_runs WHERE task_id = ? ORDER BY started_at DESC LIMIT ?",
        )
        .bind(task_id.to_string())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_run).collect()
    }
}
