//! Wiring shared by the CLI commands.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::adapters::llm::ConfiguredModelResolver;
use crate::adapters::memory::MemoryStore;
use crate::adapters::persona::FilePersonaSource;
use crate::adapters::sqlite::{
    initialize_database, SqliteInboxRepository, SqliteModuleConfigRepository, SqliteTaskRepository,
    SqliteTaskRunRepository, SqliteTriggerStateRepository,
};
use crate::adapters::tools::ToolRegistry;
use crate::adapters::triggers::builtin_modules;
use crate::domain::models::Config;
use crate::domain::ports::{
    InboxRepository, ModuleConfigRepository, TaskRepository, TaskRunRepository,
    TriggerStateRepository,
};
use crate::services::{Engine, EngineDeps, EventBus, PricingTable, TaskService, TriggerRegistry};

/// The five stores behind one backend.
#[derive(Clone)]
pub struct Stores {
    pub tasks: Arc<dyn TaskRepository>,
    pub runs: Arc<dyn TaskRunRepository>,
    pub states: Arc<dyn TriggerStateRepository>,
    pub modules: Arc<dyn ModuleConfigRepository>,
    pub inbox: Arc<dyn InboxRepository>,
}

impl Stores {
    pub fn sqlite(pool: &SqlitePool) -> Self {
        Self {
            tasks: Arc::new(SqliteTaskRepository::new(pool.clone())),
            runs: Arc::new(SqliteTaskRunRepository::new(pool.clone())),
            states: Arc::new(SqliteTriggerStateRepository::new(pool.clone())),
            modules: Arc::new(SqliteModuleConfigRepository::new(pool.clone())),
            inbox: Arc::new(SqliteInboxRepository::new(pool.clone())),
        }
    }

    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            tasks: store.clone(),
            runs: store.clone(),
            states: store.clone(),
            modules: store.clone(),
            inbox: store,
        }
    }
}

pub struct AppContext {
    pub config: Config,
    pub bus: Arc<EventBus>,
    pub registry: Arc<TriggerRegistry>,
    pub stores: Stores,
    pub engine: Arc<Engine>,
    /// Not attached to the engine: one-shot commands must not arm timers.
    pub tasks: TaskService,
}

impl AppContext {
    /// Open the configured database.
    pub async fn open(config: Config) -> Result<Self> {
        let pool = initialize_database(&config.database)
            .await
            .context("Failed to initialize database. Run 'cadence init' first.")?;
        Self::build(config, Stores::sqlite(&pool))
    }

    /// Everything in memory; nothing survives the process.
    pub fn ephemeral(config: Config) -> Result<Self> {
        Self::build(config, Stores::memory())
    }

    pub fn build(config: Config, stores: Stores) -> Result<Self> {
        let bus = Arc::new(EventBus::default());
        let registry = Arc::new(TriggerRegistry::from_modules(&builtin_modules(&bus)));
        let models = ConfiguredModelResolver::from_config(&config.llm)
            .context("Failed to configure the model provider")?;

        let deps = EngineDeps {
            tasks: Arc::clone(&stores.tasks),
            runs: Arc::clone(&stores.runs),
            states: Arc::clone(&stores.states),
            modules: Arc::clone(&stores.modules),
            inbox: Arc::clone(&stores.inbox),
            notifier: bus.clone(),
            models: Arc::new(models),
            tools: Arc::new(ToolRegistry::with_builtins()),
            persona: Arc::new(FilePersonaSource::new(config.executor.persona_dir.clone())),
            costs: Some(Arc::new(PricingTable)),
            registry: Arc::clone(&registry),
        };
        let engine = Arc::new(Engine::new(deps, &config));
        let tasks = TaskService::new(
            Arc::clone(&stores.tasks),
            Arc::clone(&stores.runs),
            Arc::clone(&registry),
        );

        Ok(Self {
            config,
            bus,
            registry,
            stores,
            engine,
            tasks,
        })
    }
}
