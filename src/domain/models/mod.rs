pub mod config;
pub mod inbox;
pub mod task;
pub mod task_run;
pub mod trigger;

pub use config::{
    Config, DatabaseConfig, ExecutorConfig, LlmConfig, LogFormat, LoggingConfig, RotationPolicy,
    SchedulerConfig, TriggersConfig,
};
pub use inbox::{AgentStatus, EngineEvent, InboxItem, InboxKind};
pub use task::{duration_from_minutes, Task, TriggerKind, BUILTIN_TRIGGER_KINDS};
pub use task_run::{RunStatus, TaskRun, UsageSummary};
pub use trigger::{
    PollOutcome, TriggerContext, TriggerEvent, TriggerSpec, TriggerState, TriggerTypeInfo,
};
