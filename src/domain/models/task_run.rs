//! Task run domain model: one execution attempt of a task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Status of a task run. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Token and cost accounting for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl UsageSummary {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            cost_usd: None,
            model: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRun {
    pub id: Uuid,
    pub task_id: Uuid,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub usage: Option<UsageSummary>,
}

impl TaskRun {
    /// A fresh run in `running` state.
    pub fn start(task_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            status: RunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            result: None,
            error: None,
            usage: None,
        }
    }

    pub fn complete(&mut self, result: String, usage: Option<UsageSummary>) -> DomainResult<()> {
        self.finish(RunStatus::Completed)?;
        self.result = Some(result);
        self.usage = usage;
        Ok(())
    }

    pub fn fail(&mut self, error: String) -> DomainResult<()> {
        self.finish(RunStatus::Failed)?;
        self.error = Some(error);
        Ok(())
    }

    fn finish(&mut self, to: RunStatus) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: "run already finished".to_string(),
            });
        }
        self.status = to;
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}
