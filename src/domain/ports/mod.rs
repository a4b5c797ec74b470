//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces for every collaborator the engine talks to:
//! - Stores: tasks, runs, trigger state, module configuration, inbox
//! - Model provider and resolver
//! - Tool-set builder, persona source, cost lookup
//! - Notifier for artifacts and status
//! - Trigger handlers and modules

pub mod cost;
pub mod inbox_repository;
pub mod model_provider;
pub mod notifier;
pub mod persona;
pub mod task_repository;
pub mod task_run_repository;
pub mod toolset;
pub mod trigger_handler;
pub mod trigger_state_repository;

pub use cost::CostLookup;
pub use inbox_repository::InboxRepository;
pub use model_provider::{
    GenerateRequest, Generation, ModelProvider, ModelResolver, ProviderError, TokenUsage,
};
pub use notifier::Notifier;
pub use persona::PersonaSource;
pub use task_repository::{TaskFilter, TaskRepository};
pub use task_run_repository::TaskRunRepository;
pub use toolset::{Tool, ToolSet, ToolSetBuilder};
pub use trigger_handler::{EventSink, ModuleTrigger, TriggerHandler, TriggerModule, Unsubscribe};
pub use trigger_state_repository::{ModuleConfigRepository, TriggerStateRepository};
