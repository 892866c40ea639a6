//! Drive the synchronous task engine ("FluxCapacitor") for one invocation.
//!
//! Each `flowplug task run` call builds a fresh in-memory engine, submits a
//! single root task, drains the worker loop to completion, and reports the
//! resulting tree. There is no cross-invocation persistence: a long-lived
//! engine is the host binary's job, not the CLI's.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::Subcommand;
use flowplug_core::hooks::{HookRegistry, PayloadRef};
use flowplug_core::tasks::{self, SyncEngine, Task, WorkerLoopConfig};

use crate::output::OutputFormat;

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Submit a root task and drive it (and any children it spawns) to completion
    Run {
        /// Plugin id the root hook belongs to
        plugin_id: String,
        /// Hook name to invoke
        hook: String,
        /// Repository name for the task's payload reference
        #[arg(long)]
        repository: Option<String>,
        /// Record id for the task's payload reference
        #[arg(long)]
        payload_id: Option<String>,
        /// Extra payload metadata as a JSON object
        #[arg(long)]
        meta: Option<String>,
        /// Cap on worker-loop iterations before giving up
        #[arg(long, default_value_t = 10_000)]
        max_iterations: u64,
    },
}

pub async fn execute(cmd: TaskCommands, format: OutputFormat) -> Result<()> {
    match cmd {
        TaskCommands::Run {
            plugin_id,
            hook,
            repository,
            payload_id,
            meta,
            max_iterations,
        } => run(plugin_id, hook, repository, payload_id, meta, max_iterations, format).await,
    }
}

async fn run(
    plugin_id: String,
    hook: String,
    repository: Option<String>,
    payload_id: Option<String>,
    meta: Option<String>,
    max_iterations: u64,
    format: OutputFormat,
) -> Result<()> {
    // No plugins are statically linked into the CLI; without a resolved
    // hook the engine will correctly error the root task rather than hang,
    // which is still useful for exercising submission/status plumbing.
    let hooks = Arc::new(HookRegistry::new());
    hooks.refresh(Vec::new()).await;

    let (store, queue) = tasks::resolve_in_memory_backends(None, None).map_err(|e| anyhow!(e.to_string()))?;
    let engine = SyncEngine::new(store, queue, hooks);

    let payload_ref = match (repository, payload_id) {
        (Some(repository), Some(id)) => {
            let meta_map: HashMap<String, serde_json::Value> = match meta {
                Some(raw) => serde_json::from_str(&raw).map_err(|e| anyhow!("invalid --meta JSON: {e}"))?,
                None => HashMap::new(),
            };
            Some(PayloadRef { repository, id, meta: meta_map })
        }
        (None, None) => None,
        _ => return Err(anyhow!("--repository and --payload-id must be given together")),
    };

    let root = Task::new_root(plugin_id, hook, payload_ref);
    let root_id = engine.submit(root).map_err(|e| anyhow!(e.to_string()))?;

    let config = WorkerLoopConfig { max_iterations: Some(max_iterations), idle_sleep: std::time::Duration::ZERO };
    engine.worker_loop(config).map_err(|e| anyhow!(e.to_string()))?;

    let done = engine.is_tree_done(&root_id).map_err(|e| anyhow!(e.to_string()))?;

    match format {
        OutputFormat::Table => {
            crate::output::print_header(&format!("task {root_id}"));
            crate::output::print_detail("tree_done", &done.to_string());
            crate::output::print_detail("status", status_label(done));
            if !done {
                crate::output::print_error("task tree did not complete; check that the invoked hook is registered");
            } else {
                crate::output::print_success("task tree completed");
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({"task_id": root_id.to_string(), "tree_done": done}))?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(&serde_json::json!({"task_id": root_id.to_string(), "tree_done": done}))?);
        }
    }
    Ok(())
}

fn status_label(done: bool) -> &'static str {
    if done {
        "done"
    } else {
        "incomplete"
    }
}
