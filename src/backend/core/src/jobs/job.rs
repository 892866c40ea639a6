//! Async job records and status aggregation (C6, §3, §4.6).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::hooks::PayloadRef;

/// Unique identifier for an async job instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The richer four-state lifecycle the async worker transitions through
/// (§4.6), as opposed to the sync engine's implicit done/errored split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

/// `{retry, created_at, ...}` (§3) — open-ended via `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMetadata {
    #[serde(default)]
    pub retry: u32,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl JobMetadata {
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            retry: 0,
            created_at,
            extra: HashMap::new(),
        }
    }
}

/// `{job_id, parent_job_id?, root_input_id, plugin_id, hook, payload_ref?,
/// metadata, status}` (§3's "async job" record).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsyncJob {
    pub job_id: JobId,
    #[serde(default)]
    pub parent_job_id: Option<JobId>,
    pub root_input_id: String,
    pub plugin_id: String,
    pub hook: String,
    #[serde(default)]
    pub payload_ref: Option<PayloadRef>,
    pub metadata: JobMetadata,
    pub status: JobStatus,
    #[serde(default)]
    pub error: Option<String>,
}

impl AsyncJob {
    pub fn new_root(
        plugin_id: impl Into<String>,
        hook: impl Into<String>,
        root_input_id: impl Into<String>,
        payload_ref: Option<PayloadRef>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            parent_job_id: None,
            root_input_id: root_input_id.into(),
            plugin_id: plugin_id.into(),
            hook: hook.into(),
            payload_ref,
            metadata: JobMetadata::new(created_at),
            status: JobStatus::Pending,
            error: None,
        }
    }
}

/// `{job_id, status, progress, children}` (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: f64,
    pub children: Vec<StatusView>,
}

/// Storage contract for async jobs (§4.6). Implementations decide their own
/// transactional semantics; the worker requires only that individual calls
/// appear atomic (§5).
pub trait JobStore: Send + Sync {
    fn create_job(&self, job: AsyncJob) -> Result<()>;
    fn get_job(&self, id: &JobId) -> Result<Option<AsyncJob>>;
    fn set_status(&self, id: &JobId, status: JobStatus, error: Option<String>) -> Result<()>;
    fn children(&self, parent: &JobId) -> Result<Vec<AsyncJob>>;
}

/// Build the recursive status-aggregation view for `job_id` (§4.6).
///
/// `progress` is done-leaves over total-leaves, rounded to 4 decimal places
/// (a leafless node counts as one leaf: 1.0 if its own status is `Done`,
/// else 0.0). Aggregated `status` follows a fixed priority order: any
/// `Failed` descendant wins outright; otherwise any `Running`/`Pending`
/// descendant forces `Running`; otherwise the node's own `Failed` status
/// wins; otherwise the node's own status applies, except a `Done` node with
/// an incomplete descendant reports `Running`.
pub fn get_status_view(store: &dyn JobStore, job_id: &JobId) -> Result<Option<StatusView>> {
    let Some(job) = store.get_job(job_id)? else {
        return Ok(None);
    };
    Ok(Some(build_view(store, &job)?))
}

fn build_view(store: &dyn JobStore, job: &AsyncJob) -> Result<StatusView> {
    let children_jobs = store.children(&job.job_id)?;
    if children_jobs.is_empty() {
        let progress = if job.status == JobStatus::Done { 1.0 } else { 0.0 };
        return Ok(StatusView {
            job_id: job.job_id,
            status: job.status,
            progress,
            children: Vec::new(),
        });
    }

    let mut children = Vec::with_capacity(children_jobs.len());
    for child in &children_jobs {
        children.push(build_view(store, child)?);
    }

    let total_leaves: f64 = children.iter().map(count_leaves).sum();
    let done_leaves: f64 = children.iter().map(sum_done_leaves).sum();
    let progress = if total_leaves > 0.0 { round4(done_leaves / total_leaves) } else { 1.0 };

    let any_child_failed = children.iter().any(|c| c.status == JobStatus::Failed);
    let any_child_unsettled = children.iter().any(|c| matches!(c.status, JobStatus::Running | JobStatus::Pending));
    let any_child_incomplete = children.iter().any(|c| c.status != JobStatus::Done);

    let status = if any_child_failed {
        JobStatus::Failed
    } else if any_child_unsettled {
        JobStatus::Running
    } else if job.status == JobStatus::Failed {
        JobStatus::Failed
    } else if job.status == JobStatus::Done && any_child_incomplete {
        JobStatus::Running
    } else {
        job.status
    };

    Ok(StatusView {
        job_id: job.job_id,
        status,
        progress,
        children,
    })
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn count_leaves(view: &StatusView) -> f64 {
    if view.children.is_empty() {
        1.0
    } else {
        view.children.iter().map(count_leaves).sum()
    }
}

fn sum_done_leaves(view: &StatusView) -> f64 {
    if view.children.is_empty() {
        if view.status == JobStatus::Done {
            1.0
        } else {
            0.0
        }
    } else {
        view.children.iter().map(sum_done_leaves).sum()
    }
}

/// In-memory [`JobStore`] for tests and single-process hosts.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: dashmap::DashMap<JobId, AsyncJob>,
    children_index: dashmap::DashMap<JobId, Vec<JobId>>,
}

impl JobStore for InMemoryJobStore {
    fn create_job(&self, job: AsyncJob) -> Result<()> {
        if let Some(parent) = job.parent_job_id {
            self.children_index.entry(parent).or_default().push(job.job_id);
        }
        self.jobs.insert(job.job_id, job);
        Ok(())
    }

    fn get_job(&self, id: &JobId) -> Result<Option<AsyncJob>> {
        Ok(self.jobs.get(id).map(|j| j.clone()))
    }

    fn set_status(&self, id: &JobId, status: JobStatus, error: Option<String>) -> Result<()> {
        if let Some(mut job) = self.jobs.get_mut(id) {
            job.status = status;
            job.error = error;
        }
        Ok(())
    }

    fn children(&self, parent: &JobId) -> Result<Vec<AsyncJob>> {
        let Some(ids) = self.children_index.get(parent) else {
            return Ok(Vec::new());
        };
        Ok(ids.iter().filter_map(|id| self.jobs.get(id).map(|j| j.clone())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(status: JobStatus, parent: Option<JobId>) -> AsyncJob {
        AsyncJob {
            job_id: JobId::new(),
            parent_job_id: parent,
            root_input_id: "root".to_string(),
            plugin_id: "p1".to_string(),
            hook: "ingest".to_string(),
            payload_ref: None,
            metadata: JobMetadata::new(Utc::now()),
            status,
            error: None,
        }
    }

    #[test]
    fn leafless_done_node_has_progress_one() {
        let store = InMemoryJobStore::default();
        let root = job(JobStatus::Done, None);
        let id = root.job_id;
        store.create_job(root).unwrap();

        let view = get_status_view(&store, &id).unwrap().unwrap();
        assert_eq!(view.progress, 1.0);
        assert_eq!(view.status, JobStatus::Done);
    }

    #[test]
    fn failed_descendant_propagates_failed_status() {
        let store = InMemoryJobStore::default();
        let mut root = job(JobStatus::Done, None);
        let root_id = root.job_id;
        root.status = JobStatus::Done;
        store.create_job(root).unwrap();

        let mut child1 = job(JobStatus::Done, Some(root_id));
        child1.status = JobStatus::Done;
        store.create_job(child1).unwrap();

        let mut child2 = job(JobStatus::Failed, Some(root_id));
        child2.status = JobStatus::Failed;
        store.create_job(child2).unwrap();

        let view = get_status_view(&store, &root_id).unwrap().unwrap();
        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!(view.progress, 0.5);
    }

    #[test]
    fn done_node_with_incomplete_descendant_reports_running() {
        let store = InMemoryJobStore::default();
        let root = job(JobStatus::Done, None);
        let root_id = root.job_id;
        store.create_job(root).unwrap();

        let child = job(JobStatus::Running, Some(root_id));
        store.create_job(child).unwrap();

        let view = get_status_view(&store, &root_id).unwrap().unwrap();
        assert_eq!(view.status, JobStatus::Running);
    }
}
