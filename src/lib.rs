//! Cadence - task orchestration engine
//!
//! Runs user-defined LLM tasks on cron expressions, fixed intervals, or
//! events delivered by trigger modules, and records every run and its
//! result artifact.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, the error taxonomy and port traits
//! - **Service Layer** (`services`): executor, scheduler, trigger registry,
//!   poller and subscriber, tied together by the [`Engine`] facade
//! - **Adapters** (`adapters`): SQLite and in-memory stores, model providers,
//!   tools, persona and the built-in trigger modules
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{Config, Task, TaskRun, TriggerContext, TriggerEvent, TriggerKind};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::logging::LoggerImpl;
pub use services::{
    Engine, EngineDeps, TaskExecutor, TaskScheduler, TriggerPoller, TriggerRegistry,
    TriggerSubscriber,
};
