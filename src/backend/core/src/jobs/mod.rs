//! Task Engine — Async Worker (C6, §4.6).
//!
//! Contract identical to [`crate::tasks`]'s sync engine, with a richer
//! four-state lifecycle ([`job::JobStatus`]) driven off a queue that
//! supports time-bounded dequeue ([`queue::JobQueue`]) instead of an
//! in-process call stack. Child declaration goes through a single channel
//! — a hook's [`crate::hooks::HookOutcome::Children`] — rather than the
//! sync engine's context-staging mechanism, per §9's unification of the
//! two source mechanisms.

pub mod job;
pub mod queue;
pub mod worker;

pub use job::{get_status_view, AsyncJob, InMemoryJobStore, JobId, JobMetadata, JobStatus, JobStore, StatusView};
pub use queue::{InMemoryJobQueue, JobQueue, RedisJobQueue, TaskMessage};
pub use worker::{AsyncWorker, WorkerConfig, WorkerStats};
