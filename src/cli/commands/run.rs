//! Implementation of the `cadence run` command.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::cli::context::AppContext;
use crate::cli::output::{output, truncate, CommandOutput};
use crate::domain::models::{Config, EngineEvent, InboxItem};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Keep everything in memory instead of the configured database
    #[arg(long)]
    pub ephemeral: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct StartOutput {
    pub scheduled: usize,
    pub polling: Vec<String>,
    pub subscribed: Vec<String>,
    pub ephemeral: bool,
}

impl CommandOutput for StartOutput {
    fn to_human(&self) -> String {
        let list = |ids: &[String]| if ids.is_empty() { "-".to_string() } else { ids.join(", ") };
        let mut lines = vec![format!(
            "{} {} scheduled task(s)",
            style("Engine running:").green().bold(),
            self.scheduled
        )];
        lines.push(format!("  polling:    {}", list(&self.polling)));
        lines.push(format!("  subscribed: {}", list(&self.subscribed)));
        if self.ephemeral {
            lines.push("  (ephemeral: nothing is persisted)".to_string());
        }
        lines.push("Press Ctrl-C to stop.".to_string());
        lines.join("\n")
    }
}

pub async fn execute(args: RunArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = if args.ephemeral {
        AppContext::ephemeral(config)?
    } else {
        AppContext::open(config).await?
    };
    let mut events = ctx.bus.subscribe();

    let report = ctx.engine.start().await.context("Failed to start the engine")?;
    output(
        &StartOutput {
            scheduled: report.scheduled,
            polling: report.polling,
            subscribed: report.subscribed,
            ephemeral: args.ephemeral,
        },
        json_mode,
    );

    let mut resync = resync_timer(ctx.config.scheduler.resync_interval_secs);

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "failed to listen for ctrl-c");
                }
                break;
            }
            _ = next_tick(resync.as_mut()) => {
                if let Err(e) = ctx.engine.resync().await {
                    tracing::warn!(error = %e, "resync failed");
                }
            }
            received = events.recv() => match received {
                Ok(EngineEvent::Inbox(item)) => print_item(&item, json_mode),
                Ok(EngineEvent::Status(_)) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    ctx.engine.shutdown();
    let in_flight = ctx.engine.executor().runs_in_flight();
    if in_flight > 0 {
        tracing::info!(in_flight, "waiting for running tasks");
        if tokio::time::timeout(DRAIN_TIMEOUT, ctx.engine.wait_idle()).await.is_err() {
            tracing::warn!("gave up waiting for running tasks");
        }
    }
    Ok(())
}

fn resync_timer(secs: u64) -> Option<Interval> {
    (secs > 0).then(|| {
        let period = Duration::from_secs(secs);
        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    })
}

async fn next_tick(timer: Option<&mut Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn print_item(item: &InboxItem, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string(item).unwrap_or_default());
        return;
    }
    let marker = if item.failed {
        style("✗").red().bold()
    } else {
        style("✓").green().bold()
    };
    println!(
        "{} [{}] {}\n  {}",
        marker,
        item.created_at.format("%H:%M:%S"),
        style(&item.title).bold(),
        truncate(&item.content.replace('\n', " "), 200)
    );
}
