//! Trigger descriptors, events and persisted poller state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared capabilities of a registered trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub label: String,
    pub description: String,
    pub can_poll: bool,
    pub can_subscribe: bool,
    /// Whether the handler's per-task `filter` should be consulted.
    pub can_filter: bool,
    /// Module configuration key holding the poll interval in minutes.
    pub poll_interval_key: Option<String>,
}

impl TriggerSpec {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn pollable(mut self) -> Self {
        self.can_poll = true;
        self
    }

    pub fn subscribable(mut self) -> Self {
        self.can_subscribe = true;
        self
    }

    pub fn filterable(mut self) -> Self {
        self.can_filter = true;
        self
    }

    pub fn with_poll_interval_key(mut self, key: impl Into<String>) -> Self {
        self.poll_interval_key = Some(key.into());
        self
    }

    /// Polled triggers that can also be subscribed to belong to the subscriber.
    pub fn is_polled(&self) -> bool {
        self.can_poll && !self.can_subscribe
    }
}

/// Something a trigger observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub summary: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl TriggerEvent {
    pub fn new(summary: impl Into<String>, data: Value) -> Self {
        Self {
            summary: Some(summary.into()),
            data,
        }
    }
}

/// Result of one `poll` call.
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    pub new_state: Value,
    pub event: Option<TriggerEvent>,
}

impl PollOutcome {
    pub fn quiet(new_state: Value) -> Self {
        Self { new_state, event: None }
    }

    pub fn fired(new_state: Value, event: TriggerEvent) -> Self {
        Self {
            new_state,
            event: Some(event),
        }
    }
}

/// Context handed to the executor when a trigger causes a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerContext {
    pub trigger_id: Option<String>,
    pub summary: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl TriggerContext {
    pub fn from_event(trigger_id: &str, event: &TriggerEvent) -> Self {
        Self {
            trigger_id: Some(trigger_id.to_string()),
            summary: event.summary.clone(),
            data: event.data.clone(),
        }
    }

    pub fn with_summary(summary: impl Into<String>) -> Self {
        Self {
            trigger_id: None,
            summary: Some(summary.into()),
            data: Value::Null,
        }
    }
}

/// Persisted per-trigger poller state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerState {
    pub trigger_id: String,
    pub state: Value,
    pub last_poll_at: Option<DateTime<Utc>>,
}

/// Presentation row for `get_all_trigger_types`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerTypeInfo {
    pub id: String,
    pub label: String,
    pub description: String,
    pub builtin: bool,
    pub can_poll: bool,
    pub can_subscribe: bool,
}
