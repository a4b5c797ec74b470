//! SQLite adapter for TriggerStateRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::adapters::sqlite::parse_optional_datetime;
use crate::domain::errors::DomainResult;
use crate::domain::models::TriggerState;
use crate::domain::ports::trigger_state_repository::TriggerStateRepository;

#[derive(Clone)]
pub struct SqliteTriggerStateRepository {
    pool: SqlitePool,
}

impl SqliteTriggerStateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TriggerStateRow {
    trigger_id: String,
    state: String,
    last_poll_at: Option<String>,
}

#[async_trait]
impl TriggerStateRepository for SqliteTriggerStateRepository {
    async fn get(&self, trigger_id: &str) -> DomainResult<Option<TriggerState>> {
        let row: Option<TriggerStateRow> =
            sqlx::query_as("SELECT * FROM trigger_states WHERE trigger_id = ?")
                .bind(trigger_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|r| -> DomainResult<TriggerState> {
            Ok(TriggerState {
                trigger_id: r.trigger_id,
                state: serde_json::from_str(&r.state)?,
                last_poll_at: parse_optional_datetime(r.last_poll_at)?,
            })
        })
        .transpose()
    }

    async fn put(&self, state: &TriggerState) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO trigger_states (trigger_id, state, last_poll_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(trigger_id) DO UPDATE
             SET state = excluded.state, last_poll_at = excluded.last_poll_at",
        )
        .bind(&state.trigger_id)
        .bind(state.state.to_string())
        .bind(state.last_poll_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
