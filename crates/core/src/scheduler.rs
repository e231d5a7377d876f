//! Interval-driven task runner for a single batch invocation.
//!
//! Each run loads the persisted schedule rows once, decides which registered
//! tasks are due, and runs those sequentially in registration order. Times
//! are snapped to multiples of the task interval since the Unix epoch, so an
//! hourly task invoked at 10:05 is next due at 11:00, not 11:05.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, instrument};

use keeper_store::{IdGenerator, Store, TaskRun, TaskSchedule};

use crate::clock::Clock;

/// Work performed when a task is due.
#[async_trait]
pub trait TaskBody: Send + Sync {
    async fn run(&self) -> Result<()>;
}

/// A named task and how often it runs.
#[derive(Clone)]
pub struct TaskDefinition {
    pub id: String,
    /// Minutes between runs; 0 means the task only runs when forced
    pub interval_minutes: u32,
    pub body: Arc<dyn TaskBody>,
}

impl TaskDefinition {
    pub fn new(id: impl Into<String>, interval_minutes: u32, body: Arc<dyn TaskBody>) -> Self {
        Self {
            id: id.into(),
            interval_minutes,
            body,
        }
    }

    pub fn is_manual(&self) -> bool {
        self.interval_minutes == 0
    }

    fn interval_ms(&self) -> i64 {
        i64::from(self.interval_minutes) * 60_000
    }
}

impl std::fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("id", &self.id)
            .field("interval_minutes", &self.interval_minutes)
            .finish_non_exhaustive()
    }
}

/// First boundary at or after `last_ms`; 0 when there is no record.
pub fn next_boundary(last_ms: Option<i64>, interval_ms: i64) -> i64 {
    match last_ms {
        Some(last) if interval_ms > 0 => last.div_euclid(interval_ms) * interval_ms
            + if last.rem_euclid(interval_ms) == 0 { 0 } else { interval_ms },
        _ => 0,
    }
}

/// First boundary strictly after `now_ms`. This is what gets recorded.
pub fn boundary_after(now_ms: i64, interval_ms: i64) -> i64 {
    (now_ms.div_euclid(interval_ms) + 1) * interval_ms
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub id: String,
    /// `None` on success
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub executed: Vec<TaskOutcome>,
    pub skipped: Vec<String>,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.executed.iter().filter(|o| o.error.is_some()).count()
    }
}

pub struct TaskScheduler {
    tasks: Vec<TaskDefinition>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    ids: Arc<IdGenerator>,
    forced: HashSet<String>,
}

impl TaskScheduler {
    pub fn new(
        tasks: Vec<TaskDefinition>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        ids: Arc<IdGenerator>,
    ) -> Self {
        Self {
            tasks,
            store,
            clock,
            ids,
            forced: HashSet::new(),
        }
    }

    /// Run the named tasks this invocation regardless of schedule.
    pub fn with_forced(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.forced.extend(ids);
        self
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.id.as_str())
    }

    /// Run every due task once.
    ///
    /// Task failures are recorded and do not stop later tasks. Errors returned
    /// here are bookkeeping failures (schedule or run log writes).
    #[instrument(skip(self), fields(tasks = self.tasks.len()))]
    pub async fn run_due_tasks(&self) -> Result<RunSummary> {
        let schedules = self
            .store
            .load_schedules()
            .await
            .context("failed to load task schedules")?;

        let mut summary = RunSummary::default();
        for task in &self.tasks {
            let forced = self.forced.contains(&task.id);
            let now = self.clock.now();

            if task.is_manual() && !forced {
                info!(task = %task.id, "Skipping manual-only task");
                summary.skipped.push(task.id.clone());
                continue;
            }

            if !forced {
                let last = schedules
                    .iter()
                    .find(|s| s.id == task.id)
                    .map(|s| s.time.timestamp_millis());
                let next = next_boundary(last, task.interval_ms());
                if now.timestamp_millis() < next {
                    info!(
                        task = %task.id,
                        next = %DateTime::<Utc>::from_timestamp_millis(next).unwrap_or(now),
                        "Skipping task, not due"
                    );
                    summary.skipped.push(task.id.clone());
                    continue;
                }
            }

            summary.executed.push(self.execute(task, now).await?);
        }

        info!(
            executed = summary.executed.len(),
            failed = summary.failed(),
            skipped = summary.skipped.len(),
            "Scheduler run complete"
        );
        Ok(summary)
    }

    /// Run one task now, whatever its schedule.
    pub async fn run_task(&self, id: &str) -> Result<TaskOutcome> {
        let task = self
            .tasks
            .iter()
            .find(|t| t.id == id)
            .with_context(|| format!("unknown task {id}"))?;
        self.execute(task, self.clock.now()).await
    }

    async fn execute(&self, task: &TaskDefinition, now: DateTime<Utc>) -> Result<TaskOutcome> {
        // The schedule row is written before the body runs
        let recorded = if task.is_manual() {
            now
        } else {
            let boundary = boundary_after(now.timestamp_millis(), task.interval_ms());
            DateTime::<Utc>::from_timestamp_millis(boundary).unwrap_or(now)
        };
        self.store
            .upsert_schedule(&TaskSchedule {
                id: task.id.clone(),
                time: recorded,
            })
            .await
            .with_context(|| format!("failed to record schedule for {}", task.id))?;

        info!(task = %task.id, "Running task");
        let error = match task.body.run().await {
            Ok(()) => None,
            Err(e) => {
                error!(task = %task.id, error = %format!("{e:#}"), "Task failed");
                Some(format!("{e:#}"))
            }
        };

        self.store
            .insert_task_run(&TaskRun {
                id: self.ids.next_id(),
                task: task.id.clone(),
                error: error.clone().unwrap_or_default(),
            })
            .await
            .with_context(|| format!("failed to record run of {}", task.id))?;

        Ok(TaskOutcome {
            id: task.id.clone(),
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use keeper_store::MemoryStore;
    use parking_lot::Mutex;

    const HOUR_MS: i64 = 3_600_000;

    /// Counts calls and optionally fails.
    struct CountingTask {
        name: &'static str,
        fail: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl TaskBody for CountingTask {
        async fn run(&self) -> Result<()> {
            self.log.lock().push(self.name);
            if self.fail {
                anyhow::bail!("{} exploded", self.name);
            }
            Ok(())
        }
    }

    fn task(
        name: &'static str,
        minutes: u32,
        fail: bool,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> TaskDefinition {
        TaskDefinition::new(
            name,
            minutes,
            Arc::new(CountingTask {
                name,
                fail,
                log: log.clone(),
            }),
        )
    }

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    struct Harness {
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Harness {
        fn new(now_ms: i64) -> Self {
            Self {
                store: Arc::new(MemoryStore::new()),
                clock: Arc::new(ManualClock::new(at(now_ms))),
                log: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn scheduler(&self, tasks: Vec<TaskDefinition>) -> TaskScheduler {
            TaskScheduler::new(
                tasks,
                self.store.clone(),
                self.clock.clone(),
                Arc::new(IdGenerator::new()),
            )
        }
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(next_boundary(None, HOUR_MS), 0);
        assert_eq!(next_boundary(Some(10 * HOUR_MS), HOUR_MS), 10 * HOUR_MS);
        assert_eq!(next_boundary(Some(10 * HOUR_MS + 1), HOUR_MS), 11 * HOUR_MS);
        assert_eq!(boundary_after(10 * HOUR_MS, HOUR_MS), 11 * HOUR_MS);
        assert_eq!(boundary_after(10 * HOUR_MS + 5 * 60_000, HOUR_MS), 11 * HOUR_MS);
    }

    #[tokio::test]
    async fn test_first_run_records_next_boundary() {
        let now = 500 * HOUR_MS + 17 * 60_000;
        let h = Harness::new(now);
        let scheduler = h.scheduler(vec![task("pools", 60, false, &h.log)]);

        let summary = scheduler.run_due_tasks().await.unwrap();
        assert_eq!(summary.executed.len(), 1);

        let schedules = h.store.schedules();
        assert_eq!(schedules[0].time, at(501 * HOUR_MS));
        assert!(schedules[0].time > at(now));
        assert_eq!(schedules[0].time.timestamp_millis() % HOUR_MS, 0);

        let runs = h.store.task_runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].task, "pools");
        assert_eq!(runs[0].error, "");
    }

    #[tokio::test]
    async fn test_runs_at_most_once_per_window() {
        let h = Harness::new(500 * HOUR_MS);
        let scheduler = h.scheduler(vec![task("pools", 60, false, &h.log)]);

        scheduler.run_due_tasks().await.unwrap();
        h.clock.advance(chrono::Duration::minutes(30));
        let second = scheduler.run_due_tasks().await.unwrap();

        assert!(second.executed.is_empty());
        assert_eq!(second.skipped, vec!["pools".to_string()]);
        assert_eq!(h.log.lock().len(), 1);
        assert_eq!(h.store.task_runs().len(), 1);
    }

    #[tokio::test]
    async fn test_late_run_keeps_alignment() {
        // Ran at T + 5min; next due at T + 60min, not T + 65min
        let t = 500 * HOUR_MS;
        let h = Harness::new(t + 5 * 60_000);
        let scheduler = h.scheduler(vec![task("pools", 60, false, &h.log)]);
        scheduler.run_due_tasks().await.unwrap();

        h.clock.set(at(t + 60 * 60_000 - 1));
        assert!(scheduler.run_due_tasks().await.unwrap().executed.is_empty());

        h.clock.set(at(t + 60 * 60_000));
        assert_eq!(scheduler.run_due_tasks().await.unwrap().executed.len(), 1);
        assert_eq!(h.log.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_recorded_and_later_tasks_run() {
        let h = Harness::new(500 * HOUR_MS);
        let scheduler = h.scheduler(vec![
            task("pools", 60, true, &h.log),
            task("apys", 60, false, &h.log),
        ]);

        let summary = scheduler.run_due_tasks().await.unwrap();
        assert_eq!(summary.failed(), 1);
        assert_eq!(*h.log.lock(), vec!["pools", "apys"]);

        let runs = h.store.task_runs();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].error, "pools exploded");
        assert_eq!(runs[1].error, "");
        assert_ne!(runs[0].id, runs[1].id);
        // both marked before running, including the failed one
        assert_eq!(h.store.schedules().len(), 2);
    }

    #[tokio::test]
    async fn test_manual_tasks_run_only_when_forced() {
        let h = Harness::new(500 * HOUR_MS);
        let tasks = vec![task("strategies", 0, false, &h.log)];

        let summary = h.scheduler(tasks.clone()).run_due_tasks().await.unwrap();
        assert!(summary.executed.is_empty());
        assert!(h.store.schedules().is_empty());

        let summary = h
            .scheduler(tasks)
            .with_forced(["strategies".to_string()])
            .run_due_tasks()
            .await
            .unwrap();
        assert_eq!(summary.executed.len(), 1);
    }

    #[tokio::test]
    async fn test_registration_order() {
        let h = Harness::new(500 * HOUR_MS);
        let scheduler = h.scheduler(vec![
            task("oracles", 5, false, &h.log),
            task("pools", 60, false, &h.log),
            task("events", 15, false, &h.log),
        ]);
        scheduler.run_due_tasks().await.unwrap();
        assert_eq!(*h.log.lock(), vec!["oracles", "pools", "events"]);
    }

    #[tokio::test]
    async fn test_store_unavailable_is_fatal() {
        let h = Harness::new(500 * HOUR_MS);
        h.store.set_unavailable(Some("connection refused"));
        let scheduler = h.scheduler(vec![task("pools", 60, false, &h.log)]);

        assert!(scheduler.run_due_tasks().await.is_err());
        assert!(h.log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_run_task_ignores_schedule() {
        let h = Harness::new(500 * HOUR_MS);
        let scheduler = h.scheduler(vec![task("pools", 60, false, &h.log)]);
        scheduler.run_due_tasks().await.unwrap();

        let outcome = scheduler.run_task("pools").await.unwrap();
        assert!(outcome.error.is_none());
        assert_eq!(h.log.lock().len(), 2);
        assert!(scheduler.run_task("missing").await.is_err());
    }
}
