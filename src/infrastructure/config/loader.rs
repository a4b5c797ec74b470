use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::adapters::llm::KNOWN_PROVIDERS;
use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid executor.max_steps: {0}. Must be at least 1")]
    InvalidMaxSteps(u32),

    #[error("Invalid triggers.default_poll_interval_minutes: {0}. Must be at least 1")]
    InvalidPollInterval(u64),

    #[error("Unknown llm.provider '{0}'. Must be one of: anthropic, mock")]
    UnknownProvider(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .cadence/config.yaml (project config, created by init)
    /// 3. .cadence/local.yaml (local overrides, optional)
    /// 4. Environment variables (CADENCE_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".cadence/config.yaml"))
            .merge(Yaml::file(".cadence/local.yaml"))
            .merge(Env::prefixed("CADENCE_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file. Environment overrides still apply.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("CADENCE_").split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        if config.executor.max_steps == 0 {
            return Err(ConfigError::InvalidMaxSteps(config.executor.max_steps));
        }
        if config.triggers.default_poll_interval_minutes == 0 {
            return Err(ConfigError::InvalidPollInterval(
                config.triggers.default_poll_interval_minutes,
            ));
        }

        if let Some(provider) = &config.llm.provider {
            if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
                return Err(ConfigError::UnknownProvider(provider.clone()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::LogFormat;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, ".cadence/cadence.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.triggers.default_poll_interval_minutes, 5);
        assert_eq!(config.triggers.default_cooldown_secs, 60);
        assert!(!config.scheduler.track_cron_next_run);
        assert!(config.llm.provider.is_none());
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
database:
  path: /custom/path.db
logging:
  level: debug
  format: json
llm:
  provider: mock
executor:
  max_steps: 4
triggers:
  default_cooldown_secs: 5
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.database.path, "/custom/path.db");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.llm.provider.as_deref(), Some("mock"));
        assert_eq!(config.executor.max_steps, 4);
        assert_eq!(config.executor.failure_title_prefix, "Failed: ");
        assert_eq!(config.triggers.default_cooldown_secs, 5);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();

        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLogLevel(level)) => assert_eq!(level, "loud"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = Config::default();
        config.database.max_connections = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxConnections(0))
        ));

        let mut config = Config::default();
        config.executor.max_steps = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidMaxSteps(0))));

        let mut config = Config::default();
        config.triggers.default_poll_interval_minutes = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidPollInterval(0))
        ));

        let mut config = Config::default();
        config.database.path = String::new();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::EmptyDatabasePath)));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = Config::default();
        config.llm.provider = Some("carrier-pigeon".to_string());
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_load_from_file_with_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "logging:\n  level: warn\nscheduler:\n  resync_interval_secs: 30\n",
        )
        .unwrap();

        temp_env::with_vars(
            [
                ("CADENCE_SCHEDULER__RESYNC_INTERVAL_SECS", Some("0")),
                ("CADENCE_LLM__PROVIDER", Some("mock")),
            ],
            || {
                let config = ConfigLoader::load_from_file(&path).unwrap();
                assert_eq!(config.logging.level, "warn");
                assert_eq!(config.scheduler.resync_interval_secs, 0);
                assert_eq!(config.llm.provider.as_deref(), Some("mock"));
            },
        );
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "executor:\n  max_steps: 0\n").unwrap();
        assert!(ConfigLoader::load_from_file(&path).is_err());
    }
}
