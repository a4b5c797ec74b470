//! Trigger module configuration commands.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde_json::Value;

use crate::cli::context::AppContext;
use crate::cli::output::{output, ActionOutput, CommandOutput};
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct ModuleArgs {
    #[command(subcommand)]
    pub command: ModuleCommands,
}

#[derive(Subcommand, Debug)]
pub enum ModuleCommands {
    /// Show the configuration of one module, or of every module
    Show {
        module: Option<String>,
    },
    /// Replace a module's configuration with a JSON object
    Set {
        module: String,
        /// e.g. '{"url": "https://example.com", "poll_interval_minutes": 10}'
        #[arg(value_name = "JSON")]
        settings: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct ModuleConfigOutput {
    pub modules: BTreeMap<String, Value>,
}

impl CommandOutput for ModuleConfigOutput {
    fn to_human(&self) -> String {
        self.modules
            .iter()
            .map(|(id, config)| {
                let body = serde_json::to_string_pretty(config).unwrap_or_default();
                format!("[{id}]\n{body}")
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn to_json(&self) -> Value {
        serde_json::to_value(&self.modules).unwrap_or_default()
    }
}

pub async fn execute(args: ModuleArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let known = known_modules(&ctx);

    match args.command {
        ModuleCommands::Show { module } => {
            let stored: BTreeMap<String, Value> =
                ctx.stores.modules.list().await?.into_iter().collect();
            let ids: Vec<String> = match module {
                Some(id) => {
                    if !known.contains(&id) && !stored.contains_key(&id) {
                        bail!("Unknown module: {id}");
                    }
                    vec![id]
                }
                None => known.iter().chain(stored.keys()).cloned().collect(),
            };
            let modules = ids
                .into_iter()
                .map(|id| {
                    let config = stored
                        .get(&id)
                        .cloned()
                        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
                    (id, config)
                })
                .collect();
            output(&ModuleConfigOutput { modules }, json_mode);
        }

        ModuleCommands::Set { module, settings } => {
            if !known.contains(&module) {
                bail!("Unknown module: {module}. Known modules: {}", known.join(", "));
            }
            let value: Value = serde_json::from_str(&settings)
                .context("Module configuration must be valid JSON")?;
            if !value.is_object() {
                bail!("Module configuration must be a JSON object");
            }
            ctx.stores.modules.put(&module, &value).await?;
            output(&ActionOutput::ok(format!("Configuration for '{module}' saved")), json_mode);
        }
    }

    Ok(())
}

fn known_modules(ctx: &AppContext) -> Vec<String> {
    let mut ids: Vec<String> = ctx.registry.all().into_iter().map(|t| t.module_id).collect();
    ids.sort();
    ids.dedup();
    ids
}
