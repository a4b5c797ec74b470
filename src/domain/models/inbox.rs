//! Result artifacts and agent status broadcasts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxKind {
    TaskResult,
}

impl InboxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskResult => "task_result",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "task_result" => Some(Self::TaskResult),
            _ => None,
        }
    }
}

/// The durable, user-visible record of a task outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxItem {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub kind: InboxKind,
    pub source_run_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub failed: bool,
    pub created_at: DateTime<Utc>,
}

impl InboxItem {
    pub fn task_result(
        task_id: Uuid,
        run_id: Uuid,
        title: String,
        content: String,
        failed: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            content,
            kind: InboxKind::TaskResult,
            source_run_id: Some(run_id),
            task_id: Some(task_id),
            failed,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Thinking,
    Idle,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thinking => "thinking",
            Self::Idle => "idle",
        }
    }
}

/// Everything the engine broadcasts to connected observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EngineEvent {
    Status(AgentStatus),
    Inbox(InboxItem),
}
