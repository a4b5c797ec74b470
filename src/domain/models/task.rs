//! Task domain model.
//!
//! A Task is a user-defined unit of recurring or on-demand work: an action
//! prompt plus the trigger that decides when it fires.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Trigger kinds handled by the engine itself rather than by a module.
pub const BUILTIN_TRIGGER_KINDS: [&str; 4] = ["cron", "interval", "webhook", "manual"];

/// What causes a task to fire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TriggerKind {
    Cron,
    Interval,
    Webhook,
    Manual,
    /// A trigger contributed by a module, identified by `module:local`.
    Registered(String),
}

impl TriggerKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Cron => "cron",
            Self::Interval => "interval",
            Self::Webhook => "webhook",
            Self::Manual => "manual",
            Self::Registered(id) => id,
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        match s {
            "cron" => Self::Cron,
            "interval" => Self::Interval,
            "webhook" => Self::Webhook,
            "manual" => Self::Manual,
            other => Self::Registered(other.to_string()),
        }
    }

    /// Cron and interval triggers are driven by the scheduler.
    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Cron | Self::Interval)
    }

    pub fn registered_id(&self) -> Option<&str> {
        match self {
            Self::Registered(id) => Some(id),
            _ => None,
        }
    }
}

impl From<String> for TriggerKind {
    fn from(s: String) -> Self {
        Self::from_str(&s)
    }
}

impl From<TriggerKind> for String {
    fn from(kind: TriggerKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A durable task record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub trigger_type: TriggerKind,
    /// Raw JSON text. Kept unparsed so a malformed blob is rejected where it
    /// is used instead of when the record is loaded.
    pub trigger_config: String,
    pub action_prompt: String,
    /// Allowed tool ids. `None` means every enabled tool.
    pub tools_filter: Option<Vec<String>>,
    pub is_active: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    /// Advisory; only maintained for temporal triggers.
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        name: impl Into<String>,
        action_prompt: impl Into<String>,
        trigger_type: TriggerKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            trigger_type,
            trigger_config: "{}".to_string(),
            action_prompt: action_prompt.into(),
            tools_filter: None,
            is_active: true,
            last_run_at: None,
            next_run_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_trigger_config(mut self, config: &Value) -> Self {
        self.trigger_config = config.to_string();
        self
    }

    pub fn with_raw_trigger_config(mut self, raw: impl Into<String>) -> Self {
        self.trigger_config = raw.into();
        self
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools_filter = Some(tools);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Parse the stored trigger configuration. Blank text counts as `{}`.
    pub fn parsed_trigger_config(&self) -> DomainResult<Value> {
        if self.trigger_config.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&self.trigger_config).map_err(|e| DomainError::InvalidTriggerConfig {
            task_id: self.id,
            reason: e.to_string(),
        })
    }

    /// The `cron` field of a cron trigger's configuration.
    pub fn cron_expression(&self) -> DomainResult<String> {
        let config = self.parsed_trigger_config()?;
        config
            .get("cron")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DomainError::InvalidTriggerConfig {
                task_id: self.id,
                reason: "missing string field 'cron'".to_string(),
            })
    }

    /// The `interval_minutes` field of an interval trigger, as a duration.
    pub fn interval(&self) -> DomainResult<Duration> {
        let config = self.parsed_trigger_config()?;
        let minutes = config.get("interval_minutes").and_then(Value::as_f64);
        match minutes {
            Some(m) => duration_from_minutes(m).ok_or_else(|| DomainError::InvalidTriggerConfig {
                task_id: self.id,
                reason: format!(
                    "interval_minutes must be a positive, representable number of minutes, got {m}"
                ),
            }),
            None => Err(DomainError::InvalidTriggerConfig {
                task_id: self.id,
                reason: "missing numeric field 'interval_minutes'".to_string(),
            }),
        }
    }

    /// Cooldown between subscription dispatches, from `cooldown_seconds`.
    pub fn cooldown(&self, default: Duration) -> Duration {
        self.parsed_trigger_config()
            .ok()
            .and_then(|c| c.get("cooldown_seconds").and_then(Value::as_f64))
            .filter(|s| *s >= 0.0 && s.is_finite())
            .map_or(default, |s| Duration::try_from_secs_f64(s).unwrap_or(Duration::MAX))
    }

    /// Everything that decides whether and how the scheduler arms a timer.
    pub fn schedule_fingerprint(&self) -> String {
        format!("{}|{}|{}", self.trigger_type, self.trigger_config, self.is_active)
    }
}

/// Convert a positive number of minutes into a timer period.
///
/// `None` for zero, negative or non-finite values, and for spans too long to
/// add to a clock reading or to store as a next-run timestamp.
pub fn duration_from_minutes(minutes: f64) -> Option<Duration> {
    if !(minutes > 0.0 && minutes.is_finite()) {
        return None;
    }
    Duration::try_from_secs_f64(minutes * 60.0)
        .ok()
        .filter(|d| chrono::Duration::from_std(*d).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trigger_kind_round_trips_through_strings() {
        assert_eq!(TriggerKind::from_str("cron"), TriggerKind::Cron);
        assert_eq!(
            TriggerKind::from_str("mail:inbox"),
            TriggerKind::Registered("mail:inbox".into())
        );
        assert_eq!(String::from(TriggerKind::Manual), "manual");

        let kind: TriggerKind = serde_json::from_value(json!("web:watch")).unwrap();
        assert_eq!(kind.registered_id(), Some("web:watch"));
        assert_eq!(serde_json::to_value(TriggerKind::Interval).unwrap(), json!("interval"));
    }

    #[test]
    fn test_temporal_kinds() {
        assert!(TriggerKind::Cron.is_temporal());
        assert!(TriggerKind::Interval.is_temporal());
        assert!(!TriggerKind::Webhook.is_temporal());
        assert!(!TriggerKind::Registered("a:b".into()).is_temporal());
    }

    #[test]
    fn test_interval_parsing() {
        let task = Task::new("t", "p", TriggerKind::Interval)
            .with_trigger_config(&json!({"interval_minutes": 2}));
        assert_eq!(task.interval().unwrap(), Duration::from_secs(120));

        let zero = Task::new("t", "p", TriggerKind::Interval)
            .with_trigger_config(&json!({"interval_minutes": 0}));
        assert!(zero.interval().is_err());

        let missing = Task::new("t", "p", TriggerKind::Interval);
        assert!(missing.interval().is_err());
    }

    #[test]
    fn test_oversized_interval_is_invalid() {
        for minutes in [1e300, 1e17] {
            let task = Task::new("t", "p", TriggerKind::Interval)
                .with_trigger_config(&json!({ "interval_minutes": minutes }));
            assert!(matches!(
                task.interval(),
                Err(DomainError::InvalidTriggerConfig { .. })
            ));
        }
        assert_eq!(duration_from_minutes(0.5), Some(Duration::from_secs(30)));
        assert_eq!(duration_from_minutes(f64::NAN), None);
        assert_eq!(duration_from_minutes(-1.0), None);
    }

    #[test]
    fn test_oversized_cooldown_saturates() {
        let task = Task::new("t", "p", TriggerKind::Registered("chat:message".into()))
            .with_trigger_config(&json!({ "cooldown_seconds": 1e300 }));
        assert_eq!(task.cooldown(Duration::from_secs(60)), Duration::MAX);
    }

    #[test]
    fn test_cron_expression_requires_string() {
        let task = Task::new("t", "p", TriggerKind::Cron)
            .with_trigger_config(&json!({"cron": "*/5 * * * *"}));
        assert_eq!(task.cron_expression().unwrap(), "*/5 * * * *");

        let bad = Task::new("t", "p", TriggerKind::Cron).with_trigger_config(&json!({"cron": 5}));
        assert!(bad.cron_expression().is_err());
    }

    #[test]
    fn test_unparsable_config_is_an_error() {
        let task = Task::new("t", "p", TriggerKind::Registered("a:b".into()))
            .with_raw_trigger_config("{not json");
        assert!(matches!(
            task.parsed_trigger_config(),
            Err(DomainError::InvalidTriggerConfig { .. })
        ));
    }

    #[test]
    fn test_blank_config_is_empty_object() {
        let task = Task::new("t", "p", TriggerKind::Manual).with_raw_trigger_config("  ");
        assert_eq!(task.parsed_trigger_config().unwrap(), json!({}));
    }

    #[test]
    fn test_cooldown_falls_back_to_default() {
        let default = Duration::from_secs(60);
        let task = Task::new("t", "p", TriggerKind::Registered("a:b".into()));
        assert_eq!(task.cooldown(default), default);

        let custom = task.clone().with_trigger_config(&json!({"cooldown_seconds": 5}));
        assert_eq!(custom.cooldown(default), Duration::from_secs(5));

        let negative = task.with_trigger_config(&json!({"cooldown_seconds": -1}));
        assert_eq!(negative.cooldown(default), default);
    }

    #[test]
    fn test_fingerprint_tracks_activation() {
        let task = Task::new("t", "p", TriggerKind::Interval)
            .with_trigger_config(&json!({"interval_minutes": 1}));
        let before = task.schedule_fingerprint();
        let after = task.inactive().schedule_fingerprint();
        assert_ne!(before, after);
    }
}
