use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main configuration structure for Cadence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Model provider configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Task executor configuration
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Cron/interval scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Poller and subscriber configuration
    #[serde(default)]
    pub triggers: TriggersConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".cadence/cadence.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!("sqlite:{}", self.path)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Stdout format
    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    /// Directory for rolling JSON log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub enable_stdout: bool,

    #[serde(default)]
    pub rotation: RotationPolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

const fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            enable_stdout: true,
            rotation: RotationPolicy::default(),
        }
    }
}

/// Model provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    /// Provider id (`anthropic` or `mock`). Unset means no provider is configured.
    #[serde(default)]
    pub provider: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    /// API key; falls back to `ANTHROPIC_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

const fn default_max_tokens() -> u32 {
    4096
}

const fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: default_model(),
            api_key: None,
            base_url: default_base_url(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Task executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutorConfig {
    /// Reasoning/tool step budget when tools are available
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Directory of persona/instruction markdown documents
    #[serde(default = "default_persona_dir")]
    pub persona_dir: PathBuf,

    #[serde(default = "default_empty_output_placeholder")]
    pub empty_output_placeholder: String,

    #[serde(default = "default_failure_title_prefix")]
    pub failure_title_prefix: String,
}

const fn default_max_steps() -> u32 {
    10
}

fn default_persona_dir() -> PathBuf {
    PathBuf::from(".cadence/persona")
}

fn default_empty_output_placeholder() -> String {
    "(no output)".to_string()
}

fn default_failure_title_prefix() -> String {
    "Failed: ".to_string()
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            persona_dir: default_persona_dir(),
            empty_output_placeholder: default_empty_output_placeholder(),
            failure_title_prefix: default_failure_title_prefix(),
        }
    }
}

/// Cron/interval scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Persist the next cron occurrence as the task's advisory next-run
    #[serde(default)]
    pub track_cron_next_run: bool,

    /// How often `cadence run` reconciles with the store (0 disables)
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,
}

const fn default_resync_interval_secs() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            track_cron_next_run: false,
            resync_interval_secs: default_resync_interval_secs(),
        }
    }
}

/// Poller and subscriber configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TriggersConfig {
    #[serde(default = "default_poll_interval_minutes")]
    pub default_poll_interval_minutes: u64,

    /// Delay before a new poller's first tick
    #[serde(default = "default_initial_poll_delay_secs")]
    pub initial_poll_delay_secs: u64,

    /// Cooldown used when a task does not set `cooldown_seconds`
    #[serde(default = "default_cooldown_secs")]
    pub default_cooldown_secs: u64,
}

const fn default_poll_interval_minutes() -> u64 {
    5
}

const fn default_initial_poll_delay_secs() -> u64 {
    5
}

const fn default_cooldown_secs() -> u64 {
    60
}

impl Default for TriggersConfig {
    fn default() -> Self {
        Self {
            default_poll_interval_minutes: default_poll_interval_minutes(),
            initial_poll_delay_secs: default_initial_poll_delay_secs(),
            default_cooldown_secs: default_cooldown_secs(),
        }
    }
}
