//! Registry of triggers contributed by trigger modules.
//!
//! The [`TriggerRegistry`] maps a full trigger id (`module:local`) to its
//! declared capabilities and handler. It is rebuilt from the module set at
//! startup (or on an explicit reload) before any dispatcher consults it.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::models::{
    Task, TriggerEvent, TriggerSpec, TriggerTypeInfo, BUILTIN_TRIGGER_KINDS,
};
use crate::domain::ports::{TriggerHandler, TriggerModule};

/// A trigger as seen by the dispatchers.
#[derive(Clone)]
pub struct RegisteredTrigger {
    pub module_id: String,
    pub local_id: String,
    pub full_id: String,
    pub spec: TriggerSpec,
    pub handler: Arc<dyn TriggerHandler>,
}

impl RegisteredTrigger {
    /// Apply the handler's per-task filter.
    ///
    /// Triggers that don't declare filtering match every task. A task whose
    /// stored trigger configuration cannot be parsed never matches, and
    /// neither does an event whose `data.task_id` is the task itself.
    pub fn matches(&self, event: &TriggerEvent, task: &Task) -> bool {
        let about_itself = event
            .data
            .get("task_id")
            .and_then(serde_json::Value::as_str)
            .is_some_and(|id| id == task.id.to_string());
        if about_itself {
            return false;
        }
        if !self.spec.can_filter {
            return true;
        }
        match task.parsed_trigger_config() {
            Ok(config) => self.handler.filter(event, &config),
            Err(e) => {
                tracing::warn!(
                    trigger_id = %self.full_id,
                    task_id = %task.id,
                    error = %e,
                    "skipping task with unparsable trigger config"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for RegisteredTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTrigger")
            .field("full_id", &self.full_id)
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

pub fn full_trigger_id(module_id: &str, local_id: &str) -> String {
    format!("{module_id}:{local_id}")
}

#[derive(Default)]
pub struct TriggerRegistry {
    triggers: RwLock<HashMap<String, RegisteredTrigger>>,
}

impl std::fmt::Debug for TriggerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerRegistry")
            .field("triggers", &self.trigger_ids())
            .finish()
    }
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a module set.
    pub fn from_modules(modules: &[Arc<dyn TriggerModule>]) -> Self {
        let registry = Self::new();
        registry.load_modules(modules);
        registry
    }

    /// Register one trigger and return its full id. Re-registering replaces.
    pub fn register_trigger(
        &self,
        module_id: &str,
        local_id: &str,
        spec: TriggerSpec,
        handler: Arc<dyn TriggerHandler>,
    ) -> String {
        let full_id = full_trigger_id(module_id, local_id);
        let trigger = RegisteredTrigger {
            module_id: module_id.to_string(),
            local_id: local_id.to_string(),
            full_id: full_id.clone(),
            spec,
            handler,
        };

        let mut triggers = self.triggers.write().unwrap_or_else(PoisonError::into_inner);
        if triggers.insert(full_id.clone(), trigger).is_some() {
            tracing::warn!(
                trigger_id = %full_id,
                "trigger re-registered, replacing previous handler"
            );
        }
        full_id
    }

    pub fn get_trigger(&self, full_id: &str) -> Option<RegisteredTrigger> {
        self.triggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(full_id)
            .cloned()
    }

    pub fn is_registered_trigger(&self, trigger_kind: &str) -> bool {
        self.triggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(trigger_kind)
    }

    /// Built-in kinds followed by every registered trigger, sorted by id.
    pub fn get_all_trigger_types(&self) -> Vec<TriggerTypeInfo> {
        let mut types: Vec<TriggerTypeInfo> = BUILTIN_TRIGGER_KINDS
            .iter()
            .map(|kind| TriggerTypeInfo {
                id: (*kind).to_string(),
                label: builtin_label(kind).to_string(),
                description: String::new(),
                builtin: true,
                can_poll: false,
                can_subscribe: false,
            })
            .collect();

        let mut registered: Vec<TriggerTypeInfo> = self
            .all()
            .into_iter()
            .map(|t| TriggerTypeInfo {
                id: t.full_id,
                label: t.spec.label,
                description: t.spec.description,
                builtin: false,
                can_poll: t.spec.can_poll,
                can_subscribe: t.spec.can_subscribe,
            })
            .collect();
        registered.sort_by(|a, b| a.id.cmp(&b.id));

        types.extend(registered);
        types
    }

    pub fn clear_registry(&self) {
        self.triggers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Clear, then register every trigger of every module.
    pub fn load_modules(&self, modules: &[Arc<dyn TriggerModule>]) {
        self.clear_registry();
        for module in modules {
            for trigger in module.triggers() {
                self.register_trigger(
                    module.id(),
                    &trigger.local_id,
                    trigger.spec,
                    trigger.handler,
                );
            }
        }
        tracing::info!(count = self.trigger_ids().len(), "trigger registry loaded");
    }

    pub fn all(&self) -> Vec<RegisteredTrigger> {
        self.triggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn trigger_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .triggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

fn builtin_label(kind: &str) -> &'static str {
    match kind {
        "cron" => "Cron schedule",
        "interval" => "Fixed interval",
        "webhook" => "Webhook",
        _ => "Manual",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TriggerKind;
    use crate::domain::ports::ModuleTrigger;
    use serde_json::{json, Value};

    struct KeywordFilter;

    #[async_trait::async_trait]
    impl TriggerHandler for KeywordFilter {
        fn filter(&self, event: &TriggerEvent, task_config: &Value) -> bool {
            let want = task_config.get("keyword").and_then(Value::as_str).unwrap_or_default();
            event.summary.as_deref().unwrap_or_default().contains(want)
        }
    }

    struct MailModule;

    impl TriggerModule for MailModule {
        fn id(&self) -> &str {
            "mail"
        }

        fn triggers(&self) -> Vec<ModuleTrigger> {
            vec![
                ModuleTrigger::new(
                    "inbox",
                    TriggerSpec::new("Inbox").pollable().filterable(),
                    Arc::new(KeywordFilter),
                ),
                ModuleTrigger::new(
                    "push",
                    TriggerSpec::new("Push").subscribable(),
                    Arc::new(KeywordFilter),
                ),
            ]
        }
    }

    fn registry() -> TriggerRegistry {
        let modules: Vec<Arc<dyn TriggerModule>> = vec![Arc::new(MailModule)];
        TriggerRegistry::from_modules(&modules)
    }

    #[test]
    fn test_load_modules_registers_full_ids() {
        let registry = registry();
        assert_eq!(registry.trigger_ids(), vec!["mail:inbox", "mail:push"]);
        assert!(registry.is_registered_trigger("mail:inbox"));
        assert!(!registry.is_registered_trigger("cron"));

        let trigger = registry.get_trigger("mail:inbox").unwrap();
        assert_eq!(trigger.module_id, "mail");
        assert_eq!(trigger.local_id, "inbox");
        assert!(trigger.spec.is_polled());
    }

    #[test]
    fn test_all_trigger_types_lists_builtins_first() {
        let types = registry().get_all_trigger_types();
        let ids: Vec<_> = types.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["cron", "interval", "webhook", "manual", "mail:inbox", "mail:push"]);
        assert!(types[0].builtin);
        assert!(!types[4].builtin);
    }

    #[test]
    fn test_clear_and_reload() {
        let registry = registry();
        registry.clear_registry();
        assert!(registry.get_trigger("mail:inbox").is_none());
        registry.load_modules(&[Arc::new(MailModule) as Arc<dyn TriggerModule>]);
        assert!(registry.get_trigger("mail:inbox").is_some());
    }

    #[test]
    fn test_matches_respects_filter_and_bad_config() {
        let registry = registry();
        let trigger = registry.get_trigger("mail:inbox").unwrap();
        let kind = TriggerKind::Registered("mail:inbox".into());
        let event = TriggerEvent::new("invoice from bob", Value::Null);

        let wants_invoice =
            Task::new("a", "p", kind.clone()).with_trigger_config(&json!({"keyword": "invoice"}));
        let wants_receipt =
            Task::new("b", "p", kind.clone()).with_trigger_config(&json!({"keyword": "receipt"}));
        let broken = Task::new("c", "p", kind).with_raw_trigger_config("{oops");

        assert!(trigger.matches(&event, &wants_invoice));
        assert!(!trigger.matches(&event, &wants_receipt));
        assert!(!trigger.matches(&event, &broken));
    }

    #[test]
    fn test_task_never_matches_events_about_itself() {
        let trigger = registry().get_trigger("mail:push").unwrap();
        let task = Task::new("x", "p", TriggerKind::Registered("mail:push".into()));
        let own = TriggerEvent::new("done", json!({ "task_id": task.id.to_string() }));
        let other =
            TriggerEvent::new("done", json!({ "task_id": uuid::Uuid::new_v4().to_string() }));
        assert!(!trigger.matches(&own, &task));
        assert!(trigger.matches(&other, &task));
    }

    #[test]
    fn test_non_filtering_trigger_matches_everything() {
        let trigger = registry().get_trigger("mail:push").unwrap();
        let task = Task::new("x", "p", TriggerKind::Registered("mail:push".into()))
            .with_raw_trigger_config("{oops");
        assert!(trigger.matches(&TriggerEvent::new("anything", Value::Null), &task));
    }
}
