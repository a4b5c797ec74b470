//! Task management CLI commands.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use comfy_table::{Cell, Color};

use crate::cli::context::AppContext;
use crate::cli::output::{output, table, truncate, ActionOutput, CommandOutput};
use crate::domain::models::{Config, RunStatus, Task, TaskRun, TriggerContext, TriggerKind};
use crate::domain::ports::TaskFilter;

#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommands,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task
    Create {
        /// Unique task name
        name: String,

        /// What the model should do when the task fires
        #[arg(short, long)]
        prompt: String,

        /// cron, interval, webhook, manual or a registered trigger id (module:trigger)
        #[arg(short, long, default_value = "manual")]
        trigger: String,

        /// Trigger configuration as a JSON object
        #[arg(short = 'c', long, default_value = "{}")]
        trigger_config: String,

        #[arg(short, long)]
        description: Option<String>,

        /// Allowed tool ids, comma-separated (default: all enabled tools)
        #[arg(long, value_delimiter = ',')]
        tools: Option<Vec<String>>,

        /// Create the task disabled
        #[arg(long)]
        inactive: bool,
    },
    /// List tasks
    List {
        /// Only tasks with this trigger kind
        #[arg(long)]
        trigger: Option<String>,

        #[arg(long)]
        active_only: bool,
    },
    /// Show task details and recent runs
    Show {
        /// Task ID or name
        id_or_name: String,
    },
    /// Enable a task
    Enable {
        /// Task ID or name
        id_or_name: String,
    },
    /// Disable a task
    Disable {
        /// Task ID or name
        id_or_name: String,
    },
    /// Delete a task and its run history
    Delete {
        /// Task ID or name
        id_or_name: String,
    },
    /// Run a task now and wait for the result
    Run {
        /// Task ID or name
        id_or_name: String,

        /// Annotate the run as if a trigger had fired with this summary
        #[arg(long)]
        summary: Option<String>,
    },
    /// Show recent runs of a task
    Runs {
        /// Task ID or name
        id_or_name: String,

        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct TaskSummary {
    pub id: String,
    pub name: String,
    pub trigger: String,
    pub active: bool,
    pub last_run_at: Option<String>,
    pub next_run_at: Option<String>,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.to_string(),
            name: task.name.clone(),
            trigger: task.trigger_type.to_string(),
            active: task.is_active,
            last_run_at: task.last_run_at.map(|t| t.to_rfc3339()),
            next_run_at: task.next_run_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct TaskListOutput {
    pub tasks: Vec<TaskSummary>,
    pub total: usize,
}

impl CommandOutput for TaskListOutput {
    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return "No tasks found.".to_string();
        }
        let mut t = table(&["ID", "NAME", "TRIGGER", "ACTIVE", "LAST RUN", "NEXT RUN"]);
        for task in &self.tasks {
            t.add_row(vec![
                Cell::new(&task.id[..8]),
                Cell::new(truncate(&task.name, 30)),
                Cell::new(&task.trigger),
                if task.active {
                    Cell::new("yes").fg(Color::Green)
                } else {
                    Cell::new("no").fg(Color::DarkGrey)
                },
                Cell::new(short_time(task.last_run_at.as_deref())),
                Cell::new(short_time(task.next_run_at.as_deref())),
            ]);
        }
        format!("Found {} task(s):\n{t}", self.total)
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RunSummary {
    pub id: String,
    pub status: RunStatus,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub total_tokens: Option<u64>,
    pub cost_usd: Option<f64>,
}

impl From<&TaskRun> for RunSummary {
    fn from(run: &TaskRun) -> Self {
        Self {
            id: run.id.to_string(),
            status: run.status,
            started_at: run.started_at.to_rfc3339(),
            completed_at: run.completed_at.map(|t| t.to_rfc3339()),
            result: run.result.clone(),
            error: run.error.clone(),
            total_tokens: run.usage.as_ref().map(|u| u.total_tokens),
            cost_usd: run.usage.as_ref().and_then(|u| u.cost_usd),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct TaskDetailOutput {
    pub task: TaskSummary,
    pub description: String,
    pub prompt: String,
    pub trigger_config: String,
    pub tools: Option<Vec<String>>,
    pub recent_runs: Vec<RunSummary>,
}

impl TaskDetailOutput {
    fn new(task: &Task, runs: &[TaskRun]) -> Self {
        Self {
            task: TaskSummary::from(task),
            description: task.description.clone(),
            prompt: task.action_prompt.clone(),
            trigger_config: task.trigger_config.clone(),
            tools: task.tools_filter.clone(),
            recent_runs: runs.iter().map(RunSummary::from).collect(),
        }
    }
}

impl CommandOutput for TaskDetailOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Task: {}", self.task.name),
            format!("ID: {}", self.task.id),
            format!("Trigger: {} {}", self.task.trigger, self.trigger_config),
            format!("Active: {}", self.task.active),
        ];
        if !self.description.is_empty() {
            lines.push(format!("Description: {}", self.description));
        }
        if let Some(tools) = &self.tools {
            lines.push(format!("Tools: {}", tools.join(", ")));
        }
        if let Some(next) = &self.task.next_run_at {
            lines.push(format!("Next Run: {next}"));
        }
        lines.push(format!("\nPrompt:\n{}", self.prompt));
        if !self.recent_runs.is_empty() {
            lines.push(format!("\nRecent runs:\n{}", runs_table(&self.recent_runs)));
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RunListOutput {
    pub task: String,
    pub runs: Vec<RunSummary>,
}

impl CommandOutput for RunListOutput {
    fn to_human(&self) -> String {
        if self.runs.is_empty() {
            return format!("No runs recorded for '{}'.", self.task);
        }
        format!("Runs of '{}':\n{}", self.task, runs_table(&self.runs))
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RunOutput {
    pub task: String,
    pub run: RunSummary,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        match self.run.status {
            RunStatus::Completed => {
                let mut text = format!("Task '{}' succeeded", self.task);
                if let Some(tokens) = self.run.total_tokens {
                    text.push_str(&format!(" ({tokens} tokens)"));
                }
                format!("{text}\n\n{}", self.run.result.as_deref().unwrap_or_default())
            }
            _ => format!(
                "Task '{}' failed: {}",
                self.task,
                self.run.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

fn runs_table(runs: &[RunSummary]) -> String {
    let mut t = table(&["RUN", "STATUS", "STARTED", "TOKENS", "OUTPUT"]);
    for run in runs {
        let status = match run.status {
            RunStatus::Completed => Cell::new(run.status.as_str()).fg(Color::Green),
            RunStatus::Failed => Cell::new(run.status.as_str()).fg(Color::Red),
            RunStatus::Running => Cell::new(run.status.as_str()).fg(Color::Yellow),
        };
        let text = run.error.as_deref().or(run.result.as_deref()).unwrap_or_default();
        t.add_row(vec![
            Cell::new(&run.id[..8]),
            status,
            Cell::new(short_time(Some(&run.started_at))),
            Cell::new(run.total_tokens.map_or_else(|| "-".to_string(), |n| n.to_string())),
            Cell::new(truncate(&text.replace('\n', " "), 50)),
        ]);
    }
    t.to_string()
}

fn short_time(rfc3339: Option<&str>) -> String {
    rfc3339
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
}

async fn resolve(ctx: &AppContext, id_or_name: &str) -> Result<Task> {
    ctx.tasks
        .find_task(id_or_name)
        .await?
        .ok_or_else(|| anyhow!("Task not found: {id_or_name}"))
}

pub async fn execute(args: TaskArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;

    match args.command {
        TaskCommands::Create {
            name,
            prompt,
            trigger,
            trigger_config,
            description,
            tools,
            inactive,
        } => {
            let mut task = Task::new(name, prompt, TriggerKind::from_str(&trigger))
                .with_raw_trigger_config(trigger_config);
            if let Some(description) = description {
                task = task.with_description(description);
            }
            if let Some(tools) = tools {
                task = task.with_tools(tools.into_iter().map(|t| t.trim().to_string()).collect());
            }
            if inactive {
                task = task.inactive();
            }
            let task = ctx.tasks.create_task(task).await.context("Failed to create task")?;
            output(&TaskDetailOutput::new(&task, &[]), json_mode);
        }

        TaskCommands::List { trigger, active_only } => {
            let filter = TaskFilter {
                trigger_type: trigger.as_deref().map(TriggerKind::from_str),
                active: active_only.then_some(true),
            };
            let tasks = ctx.tasks.list_tasks(filter).await?;
            let out = TaskListOutput {
                total: tasks.len(),
                tasks: tasks.iter().map(TaskSummary::from).collect(),
            };
            output(&out, json_mode);
        }

        TaskCommands::Show { id_or_name } => {
            let task = resolve(&ctx, &id_or_name).await?;
            let runs = ctx.tasks.recent_runs(task.id, 5).await?;
            output(&TaskDetailOutput::new(&task, &runs), json_mode);
        }

        TaskCommands::Enable { id_or_name } => {
            let task = resolve(&ctx, &id_or_name).await?;
            ctx.tasks.set_active(task.id, true).await?;
            output(&ActionOutput::ok(format!("Task '{}' enabled", task.name)), json_mode);
        }

        TaskCommands::Disable { id_or_name } => {
            let task = resolve(&ctx, &id_or_name).await?;
            ctx.tasks.set_active(task.id, false).await?;
            output(&ActionOutput::ok(format!("Task '{}' disabled", task.name)), json_mode);
        }

        TaskCommands::Delete { id_or_name } => {
            let task = resolve(&ctx, &id_or_name).await?;
            ctx.tasks.delete_task(task.id).await?;
            output(&ActionOutput::ok(format!("Task '{}' deleted", task.name)), json_mode);
        }

        TaskCommands::Run { id_or_name, summary } => {
            let task = resolve(&ctx, &id_or_name).await?;
            let context = summary.map(TriggerContext::with_summary);
            let run = ctx.engine.execute_now(&task, context.as_ref()).await;
            let out = RunOutput {
                task: task.name,
                run: RunSummary::from(&run),
            };
            output(&out, json_mode);
            if run.status == RunStatus::Failed {
                return Err(anyhow!("run {} failed", run.id));
            }
        }

        TaskCommands::Runs { id_or_name, limit } => {
            let task = resolve(&ctx, &id_or_name).await?;
            let runs = ctx.tasks.recent_runs(task.id, limit).await?;
            let out = RunListOutput {
                task: task.name,
                runs: runs.iter().map(RunSummary::from).collect(),
            };
            output(&out, json_mode);
        }
    }

    Ok(())
}
