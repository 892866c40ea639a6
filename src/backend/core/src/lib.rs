#![allow(clippy::result_large_err)]
//! # Flowplug Core
//!
//! A plugin runtime for repository-agnostic data pipelines: plugins declare
//! manifests and hooks, a dispatcher runs named hook pipelines in priority
//! order, and two task engines (a synchronous in-process one and an
//! async/queue-driven one) drive trees of hook invocations to completion.
//! A capability-based query validator gates ad-hoc query specs against what
//! a given repository backend actually supports.
//!
//! ## Modules
//!
//! - [`config`] — layered configuration (files, env, defaults).
//! - [`error`] — the system-error taxonomy ([`error::CoreError`]), disjoint
//!   from [`result::ResultEnvelope`]'s expected-outcome vocabulary.
//! - [`plugins`] — manifest resolution, dependency installation, discovery,
//!   and the plugin lifecycle registry.
//! - [`hooks`] — the hook registry/dispatcher ("Morpheus").
//! - [`tasks`] — the synchronous task engine ("FluxCapacitor").
//! - [`jobs`] — the async, queue-driven task engine and its job records.
//! - [`query`] — the capability-based query validator.
//! - [`result`] — the result envelope for expected (non-exceptional) outcomes.
//! - [`telemetry`] — logging, tracing, and metrics initialization.
//! - [`validation`] — general-purpose field/request validation (forms, CLI
//!   input), distinct from [`query`]'s query-AST validation.
//! - [`pagination`] — cursor/offset pagination helpers for HTTP-facing
//!   surfaces, distinct from [`query::QuerySpec`]'s `limit`/`offset` pair.

pub mod config;
pub mod error;
pub mod hooks;
pub mod jobs;
pub mod pagination;
pub mod plugins;
pub mod query;
pub mod result;
pub mod tasks;
pub mod telemetry;
pub mod validation;

pub use error::{CoreError, ErrorCode, ErrorContext, Result};

/// Commonly used types across the crate's public surface.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{CoreError, ErrorCode, ErrorContext, Result};
    pub use crate::hooks::{
        ChildRequest, DispatchContext, HookCall, HookFn, HookFuture, HookHandle, HookOutcome,
        HookRecord, HookRecordKind, HookRegistry, PayloadRef,
    };
    pub use crate::jobs::{
        get_status_view, AsyncJob, AsyncWorker, JobId, JobMetadata, JobQueue, JobStatus,
        JobStore, StatusView, TaskMessage, WorkerConfig as AsyncWorkerConfig,
    };
    pub use crate::plugins::{
        DependencyInstaller, DiscoveredPlugin, Manifest, PluginModule, PluginRecord,
        PluginRegistry,
    };
    pub use crate::query::{validate as validate_query, AllowLists, Capabilities, FilterNode, QuerySpec};
    pub use crate::result::{ResultEnvelope, Status, StatusCode, StatusDetail};
    pub use crate::tasks::{StepOutcome, SyncEngine, Task, TaskId, TaskStatus, TaskStore, TaskQueue};
}
