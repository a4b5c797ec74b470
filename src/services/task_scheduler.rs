//! Cron and interval scheduling.
//!
//! One tokio timer task per scheduled task id. Arming a task always replaces
//! any timer it already had, so there is never more than one per id. Firing
//! hands the task to the executor without waiting for the run to finish.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{SchedulerConfig, Task, TriggerKind};
use crate::domain::ports::TaskRepository;
use crate::services::task_executor::TaskExecutor;

/// What `schedule_task` did with a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Armed,
    /// Not a cron or interval task; nothing to do here.
    NotTemporal,
    Inactive,
    /// Bad cron expression or interval. Logged, no timer created.
    Invalid(String),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub armed: usize,
    pub removed: usize,
}

struct ScheduledTimer {
    handle: JoinHandle<()>,
    fingerprint: String,
}

pub struct TaskScheduler {
    executor: Arc<TaskExecutor>,
    tasks: Arc<dyn TaskRepository>,
    config: SchedulerConfig,
    timers: Mutex<HashMap<Uuid, ScheduledTimer>>,
}

impl TaskScheduler {
    pub fn new(
        executor: Arc<TaskExecutor>,
        tasks: Arc<dyn TaskRepository>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            executor,
            tasks,
            config,
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Arm a timer for `task`, replacing any existing one.
    pub async fn schedule_task(&self, task: &Task) -> ScheduleOutcome {
        self.unschedule_task(task.id);

        if !task.trigger_type.is_temporal() {
            return ScheduleOutcome::NotTemporal;
        }
        if !task.is_active {
            return ScheduleOutcome::Inactive;
        }

        let handle = match task.trigger_type {
            TriggerKind::Cron => {
                let schedule = match task
                    .cron_expression()
                    .map_err(|e| e.to_string())
                    .and_then(|expr| parse_cron(&expr))
                {
                    Ok(schedule) => schedule,
                    Err(reason) => return self.skip(task, reason),
                };
                self.spawn_cron(task.clone(), schedule)
            }
            _ => {
                let period = match task.interval() {
                    Ok(period) => period,
                    Err(e) => return self.skip(task, e.to_string()),
                };
                if let Err(e) = self.tasks.set_next_run(task.id, next_run_after(period)).await {
                    tracing::warn!(task_id = %task.id, error = %e, "failed to persist next run");
                }
                self.spawn_interval(task.clone(), period)
            }
        };

        let timer = ScheduledTimer {
            handle,
            fingerprint: task.schedule_fingerprint(),
        };
        if let Some(previous) = self.lock_timers().insert(task.id, timer) {
            previous.handle.abort();
        }
        tracing::info!(task_id = %task.id, trigger = %task.trigger_type, "task scheduled");
        ScheduleOutcome::Armed
    }

    /// Tear down the timer for `task_id`. Returns whether one existed.
    pub fn unschedule_task(&self, task_id: Uuid) -> bool {
        match self.lock_timers().remove(&task_id) {
            Some(timer) => {
                timer.handle.abort();
                tracing::debug!(task_id = %task_id, "task unscheduled");
                true
            }
            None => false,
        }
    }

    pub async fn reschedule_task(&self, task: &Task) -> ScheduleOutcome {
        self.unschedule_task(task.id);
        self.schedule_task(task).await
    }

    /// Schedule every active temporal task. Returns how many were armed.
    pub async fn init(&self) -> DomainResult<usize> {
        let mut armed = 0;
        for task in self.temporal_tasks().await? {
            if self.schedule_task(&task).await == ScheduleOutcome::Armed {
                armed += 1;
            }
        }
        tracing::info!(armed, "scheduler initialized");
        Ok(armed)
    }

    /// Reconcile timers with the store, touching only tasks that changed.
    pub async fn sync_with_store(&self) -> DomainResult<SyncReport> {
        let wanted = self.temporal_tasks().await?;
        let wanted_ids: HashSet<Uuid> = wanted.iter().map(|t| t.id).collect();

        let stale: Vec<Uuid> = self
            .lock_timers()
            .keys()
            .filter(|id| !wanted_ids.contains(id))
            .copied()
            .collect();

        let mut report = SyncReport::default();
        for id in stale {
            if self.unschedule_task(id) {
                report.removed += 1;
            }
        }

        for task in wanted {
            let fingerprint = task.schedule_fingerprint();
            let unchanged = self
                .lock_timers()
                .get(&task.id)
                .is_some_and(|t| t.fingerprint == fingerprint && !t.handle.is_finished());
            if !unchanged && self.schedule_task(&task).await == ScheduleOutcome::Armed {
                report.armed += 1;
            }
        }
        Ok(report)
    }

    pub fn shutdown(&self) {
        let mut timers = self.lock_timers();
        for (_, timer) in timers.drain() {
            timer.handle.abort();
        }
        tracing::info!("scheduler stopped");
    }

    pub fn is_scheduled(&self, task_id: Uuid) -> bool {
        self.lock_timers().contains_key(&task_id)
    }

    pub fn scheduled_count(&self) -> usize {
        self.lock_timers().len()
    }

    async fn temporal_tasks(&self) -> DomainResult<Vec<Task>> {
        let mut tasks = self.tasks.list_active(Some(&TriggerKind::Cron)).await?;
        tasks.extend(self.tasks.list_active(Some(&TriggerKind::Interval)).await?);
        Ok(tasks)
    }

    fn skip(&self, task: &Task, reason: String) -> ScheduleOutcome {
        tracing::warn!(
            task_id = %task.id,
            task = %task.name,
            reason = %reason,
            "not scheduling task"
        );
        ScheduleOutcome::Invalid(reason)
    }

    fn spawn_interval(&self, task: Task, period: Duration) -> JoinHandle<()> {
        let executor = Arc::clone(&self.executor);
        let tasks = Arc::clone(&self.tasks);
        let period = period.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = tasks.set_next_run(task.id, next_run_after(period)).await {
                    tracing::warn!(task_id = %task.id, error = %e, "failed to persist next run");
                }
                fire(&executor, tasks.as_ref(), &task).await;
            }
        })
    }

    fn spawn_cron(&self, task: Task, schedule: cron::Schedule) -> JoinHandle<()> {
        let executor = Arc::clone(&self.executor);
        let tasks = Arc::clone(&self.tasks);
        let track_next_run = self.config.track_cron_next_run;
        tokio::spawn(async move {
            // Occurrences strictly after the last one fired, never the same one twice.
            let mut after = Utc::now();
            loop {
                let Some(next) = schedule.after(&after).next() else {
                    break;
                };
                after = next;
                if track_next_run {
                    if let Err(e) = tasks.set_next_run(task.id, Some(next)).await {
                        tracing::warn!(
                            task_id = %task.id,
                            error = %e,
                            "failed to persist next run"
                        );
                    }
                }
                let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                tokio::time::sleep(wait).await;
                fire(&executor, tasks.as_ref(), &task).await;
            }
            tracing::info!(task_id = %task.id, "cron expression has no further occurrences");
        })
    }

    fn lock_timers(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, ScheduledTimer>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        for (_, timer) in self.lock_timers().drain() {
            timer.handle.abort();
        }
    }
}

fn next_run_after(period: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(period)
        .ok()
        .and_then(|d| Utc::now().checked_add_signed(d))
}

/// Run the latest stored version of the task, falling back to the armed copy
/// if the store is unreachable. Deleted or deactivated tasks are skipped.
async fn fire(executor: &Arc<TaskExecutor>, tasks: &dyn TaskRepository, armed: &Task) {
    let task = match tasks.get(armed.id).await {
        Ok(Some(task)) if task.is_active => task,
        Ok(_) => {
            tracing::debug!(task_id = %armed.id, "scheduled task gone or inactive, skipping");
            return;
        }
        Err(e) => {
            tracing::warn!(
                task_id = %armed.id,
                error = %e,
                "could not reload task, using scheduled copy"
            );
            armed.clone()
        }
    };
    tracing::debug!(task_id = %task.id, "timer fired");
    executor.spawn_execute(task, None);
}

/// Parse a 5-, 6- or 7-field cron expression. Five fields get a leading
/// seconds field of `0`.
pub fn parse_cron(expression: &str) -> Result<cron::Schedule, String> {
    let trimmed = expression.trim();
    let normalized = match trimmed.split_whitespace().count() {
        5 => format!("0 {trimmed}"),
        6 | 7 => trimmed.to_string(),
        n => return Err(format!("cron expression must have 5, 6 or 7 fields, got {n}")),
    };
    cron::Schedule::from_str(&normalized)
        .map_err(|e| format!("invalid cron expression '{trimmed}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cron_accepts_five_fields() {
        let schedule = parse_cron("*/5 * * * *").unwrap();
        let next = schedule.upcoming(Utc).next().unwrap();
        assert_eq!(next.timestamp() % 300, 0);
    }

    #[test]
    fn test_parse_cron_accepts_six_fields() {
        assert!(parse_cron("30 0 9 * * Mon-Fri").is_ok());
    }

    #[test]
    fn test_parse_cron_rejects_garbage() {
        assert!(parse_cron("not a cron").is_err());
        assert!(parse_cron("").is_err());
        assert!(parse_cron("99 * * * *").is_err());
    }
}
