//! Task Engine — Sync Core ("FluxCapacitor", C5, §4.5).
//!
//! Executes a tree of work items where each item maps to exactly one hook
//! invocation, with children declared through a task context. Storage and
//! queue backends are pluggable traits; the default in-memory
//! implementations are enough to drive the engine standalone or in tests.
//!
//! Replaces the teacher's `dag/` module: the task tree here is a
//! dynamically grown single-parent tree with no pre-declared dependency
//! edges, not a general DAG — there is nothing to topologically sort.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::hooks::{ChildRequest, DispatchContext, HookCall, HookRegistry, PayloadRef};

/// Unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `{id, plugin_id, hook, payload_ref, parent_id, created_at, finished_at?, error?}` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub plugin_id: String,
    pub hook: String,
    pub payload_ref: Option<PayloadRef>,
    pub parent_id: Option<TaskId>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Task {
    pub fn new_root(plugin_id: impl Into<String>, hook: impl Into<String>, payload_ref: Option<PayloadRef>) -> Self {
        Self {
            id: TaskId::new(),
            plugin_id: plugin_id.into(),
            hook: hook.into(),
            payload_ref,
            parent_id: None,
            created_at: Utc::now(),
            finished_at: None,
            error: None,
        }
    }

    /// A task is *done* when `finished_at` is set and `error` is null (§3).
    pub fn is_done(&self) -> bool {
        self.finished_at.is_some() && self.error.is_none()
    }

    pub fn status(&self) -> TaskStatus {
        match (&self.finished_at, &self.error) {
            (None, _) => TaskStatus::Queued,
            (Some(_), None) => TaskStatus::Done,
            (Some(_), Some(_)) => TaskStatus::Errored,
        }
    }
}

/// Derived view of a task's position in the state machine (§4.5):
/// `created -> queued -> done | errored`. Tasks only enter the store once
/// queued, so `Created` has no runtime representation here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    Done,
    Errored,
}

/// Outcome of one [`SyncEngine::run_once`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Idle,
    Progressed,
}

// ───────────────────────────────────────────────────────────────────────────
// Store / queue traits
// ───────────────────────────────────────────────────────────────────────────

/// Persists task records. Implementations need only guarantee that each
/// individual method call is atomic from the engine's vantage (§5) — no
/// cross-call transaction is required.
pub trait TaskStore: Send + Sync {
    fn create_task(&self, task: Task) -> Result<()>;
    fn get_task(&self, id: &TaskId) -> Result<Option<Task>>;
    fn mark_done(&self, id: &TaskId, finished_at: DateTime<Utc>) -> Result<()>;
    fn mark_error(&self, id: &TaskId, finished_at: DateTime<Utc>, error: String) -> Result<()>;
    fn children(&self, parent: &TaskId) -> Result<Vec<Task>>;
}

/// A FIFO queue of task ids awaiting execution.
pub trait TaskQueue: Send + Sync {
    fn push(&self, id: TaskId) -> Result<()>;
    fn pop(&self) -> Result<Option<TaskId>>;
}

// ───────────────────────────────────────────────────────────────────────────
// In-memory implementations
// ───────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: DashMap<TaskId, Task>,
    children_index: DashMap<TaskId, Vec<TaskId>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskStore for InMemoryTaskStore {
    fn create_task(&self, task: Task) -> Result<()> {
        if let Some(parent) = task.parent_id {
            self.children_index.entry(parent).or_default().push(task.id);
        }
        self.tasks.insert(task.id, task);
        Ok(())
    }

    fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        Ok(self.tasks.get(id).map(|r| r.clone()))
    }

    fn mark_done(&self, id: &TaskId, finished_at: DateTime<Utc>) -> Result<()> {
        if let Some(mut task) = self.tasks.get_mut(id) {
            task.finished_at = Some(finished_at);
            task.error = None;
        }
        Ok(())
    }

    fn mark_error(&self, id: &TaskId, finished_at: DateTime<Utc>, error: String) -> Result<()> {
        if let Some(mut task) = self.tasks.get_mut(id) {
            task.finished_at = Some(finished_at);
            task.error = Some(error);
        }
        Ok(())
    }

    fn children(&self, parent: &TaskId) -> Result<Vec<Task>> {
        let ids = self.children_index.get(parent).map(|r| r.clone()).unwrap_or_default();
        Ok(ids.into_iter().filter_map(|id| self.tasks.get(&id).map(|r| r.clone())).collect())
    }
}

#[derive(Default)]
pub struct InMemoryTaskQueue {
    queue: Mutex<std::collections::VecDeque<TaskId>>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskQueue for InMemoryTaskQueue {
    fn push(&self, id: TaskId) -> Result<()> {
        self.queue.lock().push_back(id);
        Ok(())
    }

    fn pop(&self) -> Result<Option<TaskId>> {
        Ok(self.queue.lock().pop_front())
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Sync engine
// ───────────────────────────────────────────────────────────────────────────

/// Worker-loop tuning: an optional iteration cap and a sleep interval
/// between idle polls (§4.5). A non-positive interval exits on first idle.
#[derive(Debug, Clone, Copy)]
pub struct WorkerLoopConfig {
    pub max_iterations: Option<u64>,
    pub idle_sleep: std::time::Duration,
}

impl Default for WorkerLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: None,
            idle_sleep: std::time::Duration::from_millis(0),
        }
    }
}

/// Drives the task tree: pop, execute exactly one hook per task, drain
/// staged children, mark terminal. Single-threaded and synchronous — no
/// internal concurrency, no suspension points (§5).
pub struct SyncEngine {
    store: Arc<dyn TaskStore>,
    queue: Arc<dyn TaskQueue>,
    hooks: Arc<HookRegistry>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn TaskStore>, queue: Arc<dyn TaskQueue>, hooks: Arc<HookRegistry>) -> Self {
        Self { store, queue, hooks }
    }

    /// Enqueue a brand-new root task.
    pub fn submit(&self, task: Task) -> Result<TaskId> {
        let id = task.id;
        self.store.create_task(task)?;
        self.queue.push(id)?;
        Ok(id)
    }

    /// `run_once` (§4.5): a single pop-execute-drain step.
    pub fn run_once(&self) -> Result<StepOutcome> {
        let Some(task_id) = self.queue.pop()? else {
            return Ok(StepOutcome::Idle);
        };

        let Some(task) = self.store.get_task(&task_id)? else {
            tracing::warn!(task_id = %task_id, "popped task id missing from store; dropping");
            return Ok(StepOutcome::Progressed);
        };

        let Some(handle) = self.hooks.resolve(&task.plugin_id, &task.hook) else {
            self.store.mark_error(
                &task_id,
                Utc::now(),
                format!("no handle registered for ({}, {})", task.plugin_id, task.hook),
            )?;
            return Ok(StepOutcome::Progressed);
        };

        let call = HookCall {
            dispatch: DispatchContext::new(task.plugin_id.clone()),
            piped: None,
            args: Vec::new(),
            task_id: Some(task_id.to_string()),
            payload_ref: task.payload_ref.clone(),
            spawned_children: Arc::new(parking_lot::Mutex::new(Vec::new())),
        };
        let children_handle = call.spawned_children.clone();

        // The engine itself presents no suspension points (§5); the hook's
        // future is driven to completion synchronously.
        let invocation = futures::executor::block_on(handle.handler.clone()(call));

        match invocation {
            Ok(_outcome) => {
                let staged: Vec<ChildRequest> = children_handle.lock().drain(..).collect();
                if let Err(err) = self.drain_children(&task, staged) {
                    // Mid-drain failure: children already persisted are not
                    // rolled back (documented best-effort, matches the
                    // original `run_once`).
                    self.store.mark_error(&task_id, Utc::now(), err.to_string())?;
                    return Ok(StepOutcome::Progressed);
                }
                self.store.mark_done(&task_id, Utc::now())?;
            }
            Err(err) => {
                self.store.mark_error(&task_id, Utc::now(), err.to_string())?;
            }
        }

        Ok(StepOutcome::Progressed)
    }

    fn drain_children(&self, parent: &Task, staged: Vec<ChildRequest>) -> Result<()> {
        for request in staged {
            let child = Task {
                id: TaskId::new(),
                plugin_id: request.plugin_id.unwrap_or_else(|| parent.plugin_id.clone()),
                hook: request.hook,
                payload_ref: request.payload_ref,
                parent_id: Some(parent.id),
                created_at: Utc::now(),
                finished_at: None,
                error: None,
            };
            // Persistence is ordered before enqueue (§5): the id never
            // reaches the queue before its store record exists.
            self.store.create_task(child.clone())?;
            self.queue.push(child.id)?;
        }
        Ok(())
    }

    /// Repeatedly call [`Self::run_once`] until the iteration cap is hit or
    /// the queue goes idle with a non-positive sleep interval (§4.5).
    pub fn worker_loop(&self, config: WorkerLoopConfig) -> Result<()> {
        let mut iterations: u64 = 0;
        loop {
            if let Some(max) = config.max_iterations {
                if iterations >= max {
                    return Ok(());
                }
            }
            match self.run_once()? {
                StepOutcome::Progressed => {}
                StepOutcome::Idle => {
                    if config.idle_sleep.is_zero() {
                        return Ok(());
                    }
                    std::thread::sleep(config.idle_sleep);
                }
            }
            iterations += 1;
        }
    }

    /// `is_tree_done(root_id)` (§4.5): recursively confirm every descendant
    /// of `root_id` has `finished_at` set and `error` is null. A missing
    /// root returns false.
    pub fn is_tree_done(&self, root_id: &TaskId) -> Result<bool> {
        let Some(root) = self.store.get_task(root_id)? else {
            return Ok(false);
        };
        if !root.is_done() {
            return Ok(false);
        }
        self.all_descendants_done(root_id)
    }

    fn all_descendants_done(&self, id: &TaskId) -> Result<bool> {
        for child in self.store.children(id)? {
            if !child.is_done() {
                return Ok(false);
            }
            if !self.all_descendants_done(&child.id)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Resolve the default store/queue backends named in configuration (§6's
/// `task_store_default`/`task_queue_default`). Only the in-memory backend
/// is built in; unknown names fail with `BackendFailure` rather than
/// silently falling back, so a misconfigured name is caught at startup.
pub fn resolve_in_memory_backends(
    store_name: Option<&str>,
    queue_name: Option<&str>,
) -> Result<(Arc<dyn TaskStore>, Arc<dyn TaskQueue>)> {
    match store_name {
        None | Some("memory") => {}
        Some(other) => return Err(CoreError::backend_failure(format!("unknown task store backend: {other}"))),
    }
    match queue_name {
        None | Some("memory") => {}
        Some(other) => return Err(CoreError::backend_failure(format!("unknown task queue backend: {other}"))),
    }
    Ok((Arc::new(InMemoryTaskStore::new()), Arc::new(InMemoryTaskQueue::new())))
}
