//! Implementation of the `cadence init` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tokio::fs;

use crate::adapters::persona::DEFAULT_PERSONA;
use crate::adapters::sqlite::initialize_database;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, DatabaseConfig};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config.yaml and persona file
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub files_written: Vec<String>,
    pub database_path: PathBuf,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if !self.files_written.is_empty() {
            lines.push("\nWrote:".to_string());
            for file in &self.files_written {
                lines.push(format!("  - {file}"));
            }
        }
        if self.success {
            lines.push(format!("\nDatabase ready at {}", self.database_path.display()));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: InitArgs, config: &Config, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir().context("Failed to get current directory")?.join(&args.path)
    };
    let cadence_dir = target_path.join(".cadence");
    let config_path = cadence_dir.join("config.yaml");

    if config_path.exists() && !args.force {
        let out = InitOutput {
            success: false,
            message: "Project already initialized. Use --force to rewrite the configuration."
                .to_string(),
            initialized_path: target_path,
            files_written: vec![],
            database_path: PathBuf::new(),
        };
        output(&out, json_mode);
        return Ok(());
    }

    let persona_dir = resolve(&target_path, &config.executor.persona_dir);
    for dir in [&cadence_dir, &persona_dir] {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let mut files_written = Vec::new();

    let yaml = serde_yaml::to_string(&Config::default())
        .context("Failed to render default configuration")?;
    fs::write(&config_path, yaml)
        .await
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    files_written.push(relative(&target_path, &config_path));

    let persona_path = persona_dir.join("00-persona.md");
    if args.force || !persona_path.exists() {
        fs::write(&persona_path, format!("{DEFAULT_PERSONA}\n"))
            .await
            .with_context(|| format!("Failed to write {}", persona_path.display()))?;
        files_written.push(relative(&target_path, &persona_path));
    }

    let database_path = resolve(&target_path, Path::new(&config.database.path));
    let database = DatabaseConfig {
        path: database_path.to_string_lossy().into_owned(),
        ..config.database.clone()
    };
    let pool = initialize_database(&database).await.context("Failed to initialize database")?;
    pool.close().await;

    let out = InitOutput {
        success: true,
        message: if args.force {
            "Project reinitialized successfully.".to_string()
        } else {
            "Project initialized successfully.".to_string()
        },
        initialized_path: target_path,
        files_written,
        database_path,
    };
    output(&out, json_mode);
    Ok(())
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn relative(base: &Path, path: &Path) -> String {
    path.strip_prefix(base).unwrap_or(path).to_string_lossy().into_owned()
}
