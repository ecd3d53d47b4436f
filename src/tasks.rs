//! Single-flight task orchestrator.
//!
//! At most one crawl runs at a time. [`Orchestrator::create_task`] takes the
//! global lock before it returns, registers the task, and hands the owned
//! lock guard to a background tokio task that drives the engine. The guard
//! is dropped when that background task ends, on success, failure, or
//! panic alike.
//!
//! ```text
//! pending ──▶ running ──┬──▶ success
//!                       └──▶ failed
//! ```
//!
//! Task records are kept for the lifetime of the process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::{CrawlerConfig, IngestionEngine};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Success)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub status: TaskStatus,
    pub message: String,
    pub platform: Option<String>,
    pub keywords: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    seq: u64,
}

struct Inner {
    engine: Arc<dyn IngestionEngine>,
    lock: Arc<Mutex<()>>,
    tasks: RwLock<HashMap<String, TaskRecord>>,
    next_seq: AtomicU64,
}

/// Owns the crawl lock and the task registry. Clones share both.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(engine: Arc<dyn IngestionEngine>) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine,
                lock: Arc::new(Mutex::new(())),
                tasks: RwLock::new(HashMap::new()),
                next_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Register a task and start it in the background.
    ///
    /// Fails with [`Error::Conflict`] while another task holds the lock; the
    /// running task is left untouched. Must be called within a tokio runtime.
    pub fn create_task(&self, config: CrawlerConfig) -> Result<String> {
        let guard = match self.inner.lock.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                let running = self.active_task_id().unwrap_or_else(|| "unknown".to_string());
                warn!(running = %running, "rejected crawl request: a task is already running");
                return Err(Error::Conflict { running });
            }
        };

        let task_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let record = TaskRecord {
            task_id: task_id.clone(),
            status: TaskStatus::Pending,
            message: "queued, waiting to start".to_string(),
            platform: config.platform.clone(),
            keywords: config.keywords.clone(),
            created_at: now,
            updated_at: now,
            seq: self.inner.next_seq.fetch_add(1, Ordering::Relaxed),
        };
        self.write_tasks().insert(task_id.clone(), record);
        info!(task_id = %task_id, platform = ?config.platform, "task created");

        let this = self.clone();
        let id = task_id.clone();
        tokio::spawn(async move {
            this.run(id, config, guard).await;
        });

        Ok(task_id)
    }

    /// Drive one task to a terminal state. The crawl lock `guard` is
    /// released together with the terminal status write.
    async fn run(&self, task_id: String, config: CrawlerConfig, guard: OwnedMutexGuard<()>) {
        let target = config.platform.as_deref().unwrap_or("unknown platform");
        self.transition(&task_id, TaskStatus::Running, format!("crawling {} ...", target));
        info!(task_id = %task_id, "task started");

        let engine = self.inner.engine.clone();
        let outcome = tokio::spawn(async move { engine.start(&config).await }).await;

        let (status, message) = match outcome {
            Ok(Ok(())) => {
                info!(task_id = %task_id, "task succeeded");
                (TaskStatus::Success, "crawl finished successfully".to_string())
            }
            Ok(Err(e)) => {
                let message = format!("{:#}", e);
                error!(task_id = %task_id, error = %message, "task failed");
                (TaskStatus::Failed, message)
            }
            Err(join) => {
                let message = if join.is_panic() {
                    format!("crawler panicked: {}", panic_message(join.into_panic()))
                } else {
                    format!("crawler was cancelled: {}", join)
                };
                error!(task_id = %task_id, error = %message, "task failed");
                (TaskStatus::Failed, message)
            }
        };
        self.finish(&task_id, status, message, guard);
        info!(task_id = %task_id, "task finished, crawl lock released");
    }

    pub fn get_status(&self, task_id: &str) -> Result<TaskRecord> {
        self.read_tasks()
            .get(task_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("task '{}'", task_id)))
    }

    /// All tasks, most recent first.
    pub fn list_tasks(&self) -> Vec<TaskRecord> {
        let mut tasks: Vec<TaskRecord> = self.read_tasks().values().cloned().collect();
        tasks.sort_by(|a, b| b.seq.cmp(&a.seq));
        tasks
    }

    pub fn is_busy(&self) -> bool {
        self.inner.lock.try_lock().is_err()
    }

    /// Poll until the task reaches a terminal state.
    pub async fn wait(&self, task_id: &str, interval: Duration) -> Result<TaskRecord> {
        loop {
            let record = self.get_status(task_id)?;
            if record.status.is_terminal() {
                return Ok(record);
            }
            tokio::time::sleep(interval).await;
        }
    }

    fn transition(&self, task_id: &str, next: TaskStatus, message: String) {
        let mut tasks = self.write_tasks();
        apply_transition(&mut tasks, task_id, next, message);
    }

    /// Record a terminal status and release the crawl lock under one
    /// registry write. Anyone who reads the terminal status finds the lock
    /// free.
    fn finish(&self, task_id: &str, next: TaskStatus, message: String, guard: OwnedMutexGuard<()>) {
        let mut tasks = self.write_tasks();
        apply_transition(&mut tasks, task_id, next, message);
        drop(guard);
    }

    fn active_task_id(&self) -> Option<String> {
        self.read_tasks()
            .values()
            .filter(|t| !t.status.is_terminal())
            .max_by_key(|t| t.seq)
            .map(|t| t.task_id.clone())
    }

    fn read_tasks(&self) -> RwLockReadGuard<'_, HashMap<String, TaskRecord>> {
        self.inner
            .tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_tasks(&self) -> RwLockWriteGuard<'_, HashMap<String, TaskRecord>> {
        self.inner
            .tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn apply_transition(
    tasks: &mut HashMap<String, TaskRecord>,
    task_id: &str,
    next: TaskStatus,
    message: String,
) {
    let Some(record) = tasks.get_mut(task_id) else {
        warn!(task_id, "transition for unknown task");
        return;
    };
    if !record.status.can_transition_to(next) {
        warn!(task_id, from = ?record.status, to = ?next, "ignoring illegal task transition");
        return;
    }
    record.status = next;
    record.message = message;
    record.updated_at = Utc::now();
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use TaskStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Success));
        assert!(Running.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Success));
        assert!(!Success.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Success));
        assert!(Success.is_terminal() && Failed.is_terminal());
        assert!(!Running.is_terminal());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Running).unwrap(),
            "\"running\""
        );
    }

    #[test]
    fn test_panic_message_extraction() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new("bang".to_string())), "bang");
        assert_eq!(panic_message(Box::new(7u8)), "unknown panic");
    }
}
