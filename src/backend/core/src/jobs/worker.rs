//! Async worker: the queue-driven counterpart of [`crate::tasks::SyncEngine`]
//! (C6, §4.6).
//!
//! One worker drains one queue, one message at a time. Concurrency, when
//! wanted, comes from running more worker instances (recommended topology:
//! one per plugin id, §4.6) rather than from an internal thread pool — a
//! single worker never overlaps two hook invocations, so a plugin's hook
//! never observes concurrent calls from its own worker.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hooks::{ChildRequest, DispatchContext, HookCall, HookRegistry};
use crate::jobs::job::{AsyncJob, JobId, JobMetadata, JobStatus, JobStore};
use crate::jobs::queue::{JobQueue, TaskMessage};

/// Tuning for [`AsyncWorker::run_once`]/[`AsyncWorker::worker_loop`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// How long a single dequeue attempt blocks before reporting idle.
    pub dequeue_timeout_ms: u64,
    /// Sleep applied after an idle dequeue before polling again.
    pub idle_sleep_ms: u64,
    /// Worker name, surfaced in logs only.
    pub name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            dequeue_timeout_ms: 5_000,
            idle_sleep_ms: 0,
            name: "flowplug-worker".to_string(),
        }
    }
}

/// Running counters, cheap to clone and share with a supervisor.
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    pub processed: Arc<AtomicU64>,
    pub succeeded: Arc<AtomicU64>,
    pub failed: Arc<AtomicU64>,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Outcome of a single [`AsyncWorker::run_once`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Idle,
    Progressed,
}

/// Drains a [`JobQueue`], executing each [`TaskMessage`] against one hook
/// invocation and persisting the richer `{PENDING,RUNNING,DONE,FAILED}`
/// lifecycle (§4.6).
pub struct AsyncWorker {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn JobQueue>,
    hooks: Arc<HookRegistry>,
    config: WorkerConfig,
    stats: WorkerStats,
    stop: Arc<AtomicBool>,
}

impl AsyncWorker {
    pub fn new(store: Arc<dyn JobStore>, queue: Arc<dyn JobQueue>, hooks: Arc<HookRegistry>, config: WorkerConfig) -> Self {
        Self {
            store,
            queue,
            hooks,
            config,
            stats: WorkerStats::new(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats.clone()
    }

    /// A handle that flips the worker's stop flag. The currently executing
    /// hook always finishes; the loop exits at the next dequeue boundary
    /// (§4.6's cancellation contract).
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// One dequeue-execute-transition step.
    pub async fn run_once(&self) -> Result<StepOutcome> {
        let timeout = Duration::from_millis(self.config.dequeue_timeout_ms);
        let Some(message) = self.queue.pop_timeout(timeout).await? else {
            return Ok(StepOutcome::Idle);
        };

        self.stats.processed.fetch_add(1, Ordering::Relaxed);

        // Re-entry: a message may reference a job already persisted (crash
        // recovery), in which case we drive the existing record forward
        // instead of fabricating a new one (§4.6).
        let job = match self.store.get_job(&message.job_id)? {
            Some(existing) => existing,
            None => {
                let job = AsyncJob {
                    job_id: message.job_id,
                    parent_job_id: message.parent_job_id,
                    root_input_id: message.root_input_id.clone(),
                    plugin_id: message.plugin_id.clone(),
                    hook: message.hook.clone(),
                    payload_ref: message.payload_ref.clone(),
                    metadata: message.metadata.clone(),
                    status: JobStatus::Pending,
                    error: None,
                };
                self.store.create_job(job.clone())?;
                job
            }
        };

        self.store.set_status(&job.job_id, JobStatus::Running, None)?;

        let call = HookCall {
            dispatch: DispatchContext::new(job.plugin_id.clone()),
            piped: None,
            args: Vec::new(),
            task_id: Some(job.job_id.to_string()),
            payload_ref: job.payload_ref.clone(),
            spawned_children: Arc::new(Mutex::new(Vec::new())),
        };

        let Some(handle) = self.hooks.resolve(&job.plugin_id, &job.hook) else {
            let reason = format!("no handle registered for ({}, {})", job.plugin_id, job.hook);
            self.store.set_status(&job.job_id, JobStatus::Failed, Some(reason))?;
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            return Ok(StepOutcome::Progressed);
        };

        match handle.handler.clone()(call).await {
            Ok(outcome) => {
                let requests = outcome.children().to_vec();
                self.spawn_children(&job, requests).await?;
                self.store.set_status(&job.job_id, JobStatus::Done, None)?;
                self.stats.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                self.store.set_status(&job.job_id, JobStatus::Failed, Some(err.to_string()))?;
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        Ok(StepOutcome::Progressed)
    }

    /// Normalize and dedupe the requested children by `(plugin_id, hook,
    /// payload_ref)`, persist all of them, then batch-enqueue (§4.6:
    /// children are enqueued only once every one of them is durable).
    async fn spawn_children(&self, parent: &AsyncJob, requests: Vec<ChildRequest>) -> Result<()> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut children = Vec::new();

        for request in requests {
            let plugin_id = request.plugin_id.clone().unwrap_or_else(|| parent.plugin_id.clone());
            let dedup_key = serde_json::to_string(&(&plugin_id, &request.hook, &request.payload_ref))
                .unwrap_or_default();
            if !seen.insert(dedup_key) {
                continue;
            }

            let mut metadata = JobMetadata::new(Utc::now());
            if let Some(extra) = request.metadata.as_ref().and_then(|v| v.as_object()) {
                metadata.extra = extra.clone().into_iter().collect();
            }

            let job_id = request
                .job_id
                .as_deref()
                .and_then(|s| s.parse::<uuid::Uuid>().ok())
                .map(JobId::from_uuid)
                .unwrap_or_else(JobId::new);

            children.push(AsyncJob {
                job_id,
                parent_job_id: Some(parent.job_id),
                root_input_id: parent.root_input_id.clone(),
                plugin_id,
                hook: request.hook,
                payload_ref: request.payload_ref,
                metadata,
                status: JobStatus::Pending,
                error: None,
            });
        }

        for child in &children {
            self.store.create_job(child.clone())?;
        }
        // Batch-enqueued only after every child is durable (§4.6, §5, §8):
        // no child id reaches the queue before its store record exists.
        for child in &children {
            self.queue
                .push(TaskMessage {
                    job_id: child.job_id,
                    parent_job_id: child.parent_job_id,
                    root_input_id: child.root_input_id.clone(),
                    plugin_id: child.plugin_id.clone(),
                    hook: child.hook.clone(),
                    payload_ref: child.payload_ref.clone(),
                    metadata: child.metadata.clone(),
                })
                .await?;
        }
        Ok(())
    }

    /// Repeatedly call [`Self::run_once`] until the stop flag is set. The
    /// flag is only observed at the dequeue boundary, never mid-hook
    /// (§4.6).
    pub async fn worker_loop(&self) -> Result<()> {
        tracing::info!(worker = %self.config.name, "async worker started");
        loop {
            if self.stop.load(Ordering::Relaxed) {
                break;
            }
            match self.run_once().await? {
                StepOutcome::Progressed => {}
                StepOutcome::Idle => {
                    if self.config.idle_sleep_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(self.config.idle_sleep_ms)).await;
                    }
                }
            }
        }
        tracing::info!(worker = %self.config.name, "async worker stopped");
        Ok(())
    }
}
