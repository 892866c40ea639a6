//! End-to-end tests spanning plugin activation, hook dispatch, the sync task
//! engine, the async job engine, and the query validator together.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Utc;

use flowplug_core::hooks::{ChildRequest, HookCall, HookHandle, HookOutcome, HookRecord, HookRecordKind, HookRegistry, PayloadRef};
use flowplug_core::jobs::{AsyncJob, AsyncWorker, InMemoryJobQueue, InMemoryJobStore, JobId, JobMetadata, JobQueue, JobStatus, JobStore, TaskMessage, WorkerConfig};
use flowplug_core::plugins::manifest::Manifest;
use flowplug_core::plugins::{DependencyInstaller, PluginModule, PluginRegistry};
use flowplug_core::query::{validate, AllowLists, Capabilities, CrudCapability, FilterCapability, OrderByCapability, PaginationCapability, PaginationMode, ProjectionCapability, QueryCapability, QuerySpec};
use flowplug_core::tasks::{InMemoryTaskQueue, InMemoryTaskStore, StepOutcome, SyncEngine, Task, TaskQueue, TaskStore};

fn test_manifest(name: &str) -> Manifest {
    Manifest {
        name: name.to_string(),
        version: "1.0.0".to_string(),
        keywords: Vec::new(),
        description: "test plugin".to_string(),
        author_name: "Unknown".to_string(),
        author_email: "Unknown".to_string(),
        urls: Vec::new(),
        license: "Unknown".to_string(),
        min_host_version: None,
        max_host_version: None,
    }
}

struct SplitterModule;
impl PluginModule for SplitterModule {
    fn init(&self) -> Vec<HookRecord> {
        vec![
            HookRecord {
                name: "split".to_string(),
                priority: 1,
                kind: HookRecordKind::Hook,
                handler: Arc::new(|call: HookCall| {
                    Box::pin(async move {
                        let text = call
                            .payload_ref
                            .as_ref()
                            .and_then(|p| p.meta.get("text"))
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string();
                        for word in text.split_whitespace() {
                            call.spawn_child(ChildRequest {
                                hook: "embed".to_string(),
                                plugin_id: None,
                                payload_ref: Some(PayloadRef {
                                    repository: "docs".to_string(),
                                    id: word.to_string(),
                                    meta: HashMap::new(),
                                }),
                                metadata: None,
                                job_id: None,
                            });
                        }
                        Ok(HookOutcome::Value(None))
                    })
                }),
            },
            HookRecord {
                name: "embed".to_string(),
                priority: 1,
                kind: HookRecordKind::Hook,
                handler: Arc::new(|_call: HookCall| Box::pin(async { Ok(HookOutcome::Value(None)) })),
            },
        ]
    }
}

/// A plugin is activated, its hooks land in the dispatcher, and the sync
/// task engine fans a root "split" task out into one "embed" child per word,
/// all of which complete.
#[tokio::test]
async fn plugin_activation_feeds_sync_engine_fan_out() {
    let registry = PluginRegistry::new();
    registry
        .register("splitter".to_string(), PathBuf::from("/tmp/splitter"), test_manifest("splitter"), Box::new(SplitterModule))
        .unwrap();
    let installer = DependencyInstaller::new(None, true);
    registry.activate("splitter", &installer).await.unwrap();

    let hooks = Arc::new(HookRegistry::new());
    hooks.refresh(registry.all_active_hooks()).await;

    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let queue: Arc<dyn TaskQueue> = Arc::new(InMemoryTaskQueue::new());
    let engine = SyncEngine::new(store, queue, hooks);

    let mut meta = HashMap::new();
    meta.insert("text".to_string(), serde_json::json!("alpha beta gamma"));
    let root = Task::new_root(
        "splitter",
        "split",
        Some(PayloadRef { repository: "docs".to_string(), id: "root".to_string(), meta }),
    );
    let root_id = engine.submit(root).unwrap();

    while engine.run_once().unwrap() == StepOutcome::Progressed {}

    assert!(engine.is_tree_done(&root_id).unwrap());
}

/// Deactivating a plugin drops its hooks from a subsequent refresh, so a
/// task submitted against it afterward fails instead of hanging.
#[tokio::test]
async fn deactivated_plugin_leaves_no_resolvable_hook() {
    let registry = PluginRegistry::new();
    registry
        .register("splitter".to_string(), PathBuf::from("/tmp/splitter"), test_manifest("splitter"), Box::new(SplitterModule))
        .unwrap();
    let installer = DependencyInstaller::new(None, true);
    registry.activate("splitter", &installer).await.unwrap();
    registry.deactivate("splitter").await.unwrap();

    let hooks = Arc::new(HookRegistry::new());
    hooks.refresh(registry.all_active_hooks()).await;
    assert!(hooks.resolve("splitter", "split").is_none());
}

/// The async worker drains a hook that declares children, persisting a
/// deduped set, and the status view aggregates progress across the tree.
#[tokio::test]
async fn async_worker_persists_children_and_status_aggregates() {
    let store = Arc::new(InMemoryJobStore::default());
    let queue = Arc::new(InMemoryJobQueue::new());
    let hooks = Arc::new(HookRegistry::new());

    hooks
        .refresh(vec![HookHandle {
            name: "fan_out".to_string(),
            priority: 1,
            plugin_id: Some("fanner".to_string()),
            handler: Arc::new(|_call: HookCall| {
                Box::pin(async move {
                    Ok(HookOutcome::Children {
                        value: None,
                        children: vec![
                            ChildRequest { hook: "leaf".to_string(), plugin_id: Some("fanner".to_string()), payload_ref: None, metadata: None, job_id: None },
                            ChildRequest { hook: "leaf".to_string(), plugin_id: Some("fanner".to_string()), payload_ref: None, metadata: None, job_id: None },
                        ],
                    })
                })
            }),
        }])
        .await;

    let worker = AsyncWorker::new(
        store.clone() as Arc<dyn JobStore>,
        queue.clone() as Arc<dyn JobQueue>,
        hooks.clone(),
        WorkerConfig { dequeue_timeout_ms: 50, idle_sleep_ms: 0, name: "test".to_string() },
    );

    let root = AsyncJob::new_root("fanner", "fan_out", "root", None, Utc::now());
    let root_id = root.job_id;
    store.create_job(root).unwrap();
    queue
        .push(TaskMessage {
            job_id: root_id,
            parent_job_id: None,
            root_input_id: "root".to_string(),
            plugin_id: "fanner".to_string(),
            hook: "fan_out".to_string(),
            payload_ref: None,
            metadata: JobMetadata::new(Utc::now()),
        })
        .await
        .unwrap();

    worker.run_once().await.unwrap();

    let view = flowplug_core::jobs::get_status_view(store.as_ref(), &root_id).unwrap().unwrap();
    assert_eq!(view.children.len(), 1, "two identical child requests must dedup to one persisted job");
    assert_eq!(view.status, JobStatus::Running);
}

/// A stop flag halts the worker loop at the next dequeue boundary.
#[tokio::test]
async fn worker_loop_honors_stop_flag() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::default());
    let queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new());
    let hooks = Arc::new(HookRegistry::new());
    let worker = AsyncWorker::new(store, queue, hooks, WorkerConfig { dequeue_timeout_ms: 10, idle_sleep_ms: 0, name: "test".to_string() });

    let stop = worker.stop_handle();
    stop.store(true, Ordering::SeqCst);
    worker.worker_loop().await.unwrap();
    assert!(stop.load(Ordering::Relaxed));
}

/// The query validator gates `where`/`order_by`/pagination against declared
/// capabilities and an allow-list together.
#[test]
fn query_validator_rejects_disallowed_field_even_when_capability_allows_it() {
    let caps = Capabilities {
        crud: CrudCapability::default(),
        query: QueryCapability { supported: true },
        projection: ProjectionCapability { supported: true },
        filter: FilterCapability { supported: true, pushdown: true, ops: ["eq".to_string()].into_iter().collect() },
        order_by: OrderByCapability { supported: true },
        pagination: PaginationCapability { supported: true, mode: PaginationMode::Offset, max_limit: Some(50) },
        ..Default::default()
    };
    let spec = QuerySpec::new().with_where(serde_json::json!(["eq", "secret_field", 1]));
    let allowed: HashSet<String> = ["public_field".to_string()].into_iter().collect();
    let allow = AllowLists { fields: Some(&allowed), select_fields: None, order_fields: None };

    let err = validate(&spec, &caps, allow).unwrap_err();
    assert!(err.to_string().contains("secret_field"));
}

/// A `limit` above the backend's declared maximum is clamped rather than
/// rejected outright.
#[test]
fn query_validator_clamps_limit_to_backend_maximum() {
    let caps = Capabilities {
        crud: CrudCapability::default(),
        query: QueryCapability { supported: true },
        projection: ProjectionCapability { supported: true },
        filter: FilterCapability { supported: true, pushdown: true, ops: HashSet::new() },
        order_by: OrderByCapability { supported: true },
        pagination: PaginationCapability { supported: true, mode: PaginationMode::Offset, max_limit: Some(25) },
        ..Default::default()
    };
    let spec = QuerySpec::new().with_limit(1_000);

    let clamped = validate(&spec, &caps, AllowLists::none()).unwrap();
    assert_eq!(clamped.limit, Some(25));
}
