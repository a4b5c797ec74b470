//! Command-line interface.

pub mod commands;
pub mod context;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;

use commands::inbox::InboxArgs;
use commands::init::InitArgs;
use commands::module::ModuleArgs;
use commands::run::RunArgs;
use commands::task::TaskArgs;
use commands::trigger::TriggerArgs;

#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(about = "Cadence - scheduled and event-driven LLM tasks", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (replaces .cadence/config.yaml and local.yaml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the .cadence directory, default configuration and database
    Init(InitArgs),
    /// Run the engine until interrupted
    Run(RunArgs),
    /// Task management commands
    Task(TaskArgs),
    /// Inspect and poll registered triggers
    Trigger(TriggerArgs),
    /// Trigger module configuration
    Module(ModuleArgs),
    /// Show recent result artifacts
    Inbox(InboxArgs),
}

/// Report `err` on stderr and exit with status 1.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let chain: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({ "error": err.to_string(), "causes": chain });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {}", style("error:").red().bold(), err);
        for cause in err.chain().skip(1) {
            eprintln!("  {} {}", style("caused by:").dim(), cause);
        }
    }
    std::process::exit(1)
}
