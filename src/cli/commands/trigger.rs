//! Trigger CLI commands.

use anyhow::{bail, Result};
use clap::{Args, Subcommand};

use crate::cli::context::AppContext;
use crate::cli::output::{output, table, truncate, CommandOutput};
use crate::domain::models::{Config, TriggerTypeInfo};
use crate::services::PollCycleOutcome;

#[derive(Args, Debug)]
pub struct TriggerArgs {
    #[command(subcommand)]
    pub command: TriggerCommands,
}

#[derive(Subcommand, Debug)]
pub enum TriggerCommands {
    /// List built-in trigger kinds and registered triggers
    List,
    /// Run one poll cycle for a registered trigger and wait for any runs it starts
    Poll {
        /// Full trigger id, e.g. web:watch
        trigger_id: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct TriggerListOutput {
    pub triggers: Vec<TriggerTypeInfo>,
}

impl CommandOutput for TriggerListOutput {
    fn to_human(&self) -> String {
        let mut t = table(&["ID", "LABEL", "SOURCE", "DELIVERY", "DESCRIPTION"]);
        for info in &self.triggers {
            let delivery = match (info.can_poll, info.can_subscribe) {
                (true, true) => "poll+push",
                (true, false) => "poll",
                (false, true) => "push",
                (false, false) => "-",
            };
            t.add_row(vec![
                info.id.clone(),
                info.label.clone(),
                if info.builtin { "builtin" } else { "module" }.to_string(),
                delivery.to_string(),
                truncate(&info.description, 50),
            ]);
        }
        t.to_string()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct PollOutput {
    pub trigger_id: String,
    pub outcome: String,
    pub event: bool,
    pub dispatched: usize,
}

impl PollOutput {
    fn new(trigger_id: String, outcome: &PollCycleOutcome) -> Self {
        let (label, event, dispatched) = match outcome {
            PollCycleOutcome::Completed { event, dispatched } => {
                ("completed".to_string(), *event, *dispatched)
            }
            PollCycleOutcome::Skipped => {
                ("skipped: a poll is already running".to_string(), false, 0)
            }
            PollCycleOutcome::NotPollable => ("not pollable".to_string(), false, 0),
            PollCycleOutcome::Failed(reason) => (format!("failed: {reason}"), false, 0),
        };
        Self {
            trigger_id,
            outcome: label,
            event,
            dispatched,
        }
    }
}

impl CommandOutput for PollOutput {
    fn to_human(&self) -> String {
        if self.event {
            format!(
                "Polled {}: event fired, {} task run(s) started",
                self.trigger_id, self.dispatched
            )
        } else {
            format!("Polled {}: {}", self.trigger_id, self.outcome)
        }
    }
}

pub async fn execute(args: TriggerArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;

    match args.command {
        TriggerCommands::List => {
            let out = TriggerListOutput {
                triggers: ctx.registry.get_all_trigger_types(),
            };
            output(&out, json_mode);
        }

        TriggerCommands::Poll { trigger_id } => {
            if !ctx.registry.is_registered_trigger(&trigger_id) {
                bail!("Unknown trigger: {trigger_id}. See 'cadence trigger list'.");
            }
            let outcome = ctx.engine.poller().poll_now(&trigger_id).await;
            ctx.engine.wait_idle().await;
            output(&PollOutput::new(trigger_id, &outcome), json_mode);
            if let PollCycleOutcome::Failed(reason) = outcome {
                bail!("poll failed: {reason}");
            }
        }
    }

    Ok(())
}
