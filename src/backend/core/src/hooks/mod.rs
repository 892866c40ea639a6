//! Hook Registry / Dispatcher ("Morpheus", C4, §4.4).
//!
//! Indexes plugin-supplied hooks by name, orders them by priority, and
//! executes named pipelines with per-handle failure isolation. The original
//! stack-walking "plugin of caller" lookup (§4.4, §9) is replaced here with
//! explicit [`DispatchContext`] propagation — every invocation carries the
//! calling plugin id rather than having the dispatcher introspect a call
//! stack.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

// ───────────────────────────────────────────────────────────────────────────
// Shared vocabulary (§3): payload references and child requests
// ───────────────────────────────────────────────────────────────────────────

/// A structured reference to a repository-owned record, carried by tasks and
/// jobs (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadRef {
    pub repository: String,
    pub id: String,
    #[serde(default)]
    pub meta: HashMap<String, serde_json::Value>,
}

/// A declarative description of a task/job a hook wants created (§3).
/// Emitted by a hook via a supplied context (C5) or returned as part of a
/// result value (C6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildRequest {
    pub hook: String,
    #[serde(default)]
    pub plugin_id: Option<String>,
    #[serde(default)]
    pub payload_ref: Option<PayloadRef>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub job_id: Option<String>,
}

// ───────────────────────────────────────────────────────────────────────────
// Dispatch context — explicit replacement for stack-walking caller lookup
// ───────────────────────────────────────────────────────────────────────────

/// Carries the identity of the currently executing plugin explicitly,
/// instead of resolving it by walking the call stack (§4.4, §9).
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    pub plugin_id: Option<String>,
    pub extra: HashMap<String, serde_json::Value>,
}

impl DispatchContext {
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: Some(plugin_id.into()),
            extra: HashMap::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Resolve the plugin id carried by this context, raising the same two
    /// failure modes the original stack-walking lookup had (§4.4):
    /// `UnknownCallerContext` when nothing identifies a caller, and
    /// `PluginNotFound` when the identified plugin isn't registered.
    pub fn resolve_caller(&self, known_plugin_ids: &[String]) -> Result<String> {
        let id = self
            .plugin_id
            .clone()
            .ok_or_else(CoreError::unknown_caller_context)?;
        if known_plugin_ids.iter().any(|p| p == &id) {
            Ok(id)
        } else {
            Err(CoreError::plugin_not_found(id))
        }
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Hook handles and invocation
// ───────────────────────────────────────────────────────────────────────────

/// The unified argument struct every hook accepts (§9's replacement for
/// dynamic-signature invocation): fields a given call site doesn't use are
/// simply left at their defaults.
pub struct HookCall {
    pub dispatch: DispatchContext,
    /// The piped value (piped-pipeline invocations only).
    pub piped: Option<serde_json::Value>,
    /// Trailing positional arguments (piped-pipeline invocations only).
    pub args: Vec<serde_json::Value>,
    /// Present when invoked by the sync task engine (C5).
    pub task_id: Option<String>,
    pub payload_ref: Option<PayloadRef>,
    /// Children staged by the hook via context (C5 only — see the async
    /// worker's distinct return-value mechanism in `jobs`).
    pub spawned_children: Arc<parking_lot::Mutex<Vec<ChildRequest>>>,
}

impl HookCall {
    /// A bare invocation carrying no piped value, arguments, or task
    /// context — used for no-arg pipelines and lifecycle overrides.
    pub fn bare(dispatch: DispatchContext) -> Self {
        Self {
            dispatch,
            piped: None,
            args: Vec::new(),
            task_id: None,
            payload_ref: None,
            spawned_children: Arc::new(parking_lot::Mutex::new(Vec::new())),
        }
    }

    /// Record a child task request (the C5 context-staging mechanism).
    pub fn spawn_child(&self, request: ChildRequest) {
        self.spawned_children.lock().push(request);
    }
}

/// What a hook handler returns. `Children` is consumed only by the async
/// worker (C6); the sync engine (C5) relies solely on [`HookCall::spawn_child`].
pub enum HookOutcome {
    Value(Option<serde_json::Value>),
    Children {
        value: Option<serde_json::Value>,
        children: Vec<ChildRequest>,
    },
}

impl HookOutcome {
    pub fn value(&self) -> Option<&serde_json::Value> {
        match self {
            HookOutcome::Value(v) => v.as_ref(),
            HookOutcome::Children { value, .. } => value.as_ref(),
        }
    }

    pub fn into_value(self) -> Option<serde_json::Value> {
        match self {
            HookOutcome::Value(v) => v,
            HookOutcome::Children { value, .. } => value,
        }
    }

    pub fn children(&self) -> &[ChildRequest] {
        match self {
            HookOutcome::Value(_) => &[],
            HookOutcome::Children { children, .. } => children,
        }
    }
}

pub type HookFuture = BoxFuture<'static, Result<HookOutcome>>;
pub type HookFn = dyn Fn(HookCall) -> HookFuture + Send + Sync;

/// `{name, function, priority, plugin_id}` (§3). Priority defaults to 1;
/// higher executes first, ties resolve by insertion order.
#[derive(Clone)]
pub struct HookHandle {
    pub name: String,
    pub priority: i32,
    pub plugin_id: Option<String>,
    pub handler: Arc<HookFn>,
}

impl std::fmt::Debug for HookHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookHandle")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("plugin_id", &self.plugin_id)
            .finish()
    }
}

/// Whether an item collected from a plugin's `init()` is a hook or a
/// lifecycle override (`activated`/`deactivated`) — §9's replacement for
/// "collect all top-level values whose type matches".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookRecordKind {
    Hook,
    LifecycleOverride,
}

/// One record returned by a plugin's `init()` (§9).
#[derive(Clone)]
pub struct HookRecord {
    pub name: String,
    pub priority: i32,
    pub kind: HookRecordKind,
    pub handler: Arc<HookFn>,
}

// ───────────────────────────────────────────────────────────────────────────
// Refresh callbacks
// ───────────────────────────────────────────────────────────────────────────

/// A refresh-completion callback; both synchronous and asynchronous
/// callbacks are accepted (§4.4) — the dispatcher awaits each.
pub enum RefreshCallback {
    Sync(Arc<dyn Fn() + Send + Sync>),
    Async(Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>),
}

// ───────────────────────────────────────────────────────────────────────────
// Hook registry
// ───────────────────────────────────────────────────────────────────────────

/// Indexes hooks by name, sorted by descending priority (stable within a
/// priority), and executes pipelines with per-handle failure isolation
/// (§4.4).
pub struct HookRegistry {
    index: RwLock<HashMap<String, Vec<HookHandle>>>,
    callbacks: RwLock<Vec<RefreshCallback>>,
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            index: RwLock::new(HashMap::new()),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, callback: RefreshCallback) {
        self.callbacks.write().push(callback);
    }

    /// Rebuild the `name -> [handle]` index from every active plugin's hook
    /// list, then invoke every subscribed refresh callback.
    pub async fn refresh(&self, handles: Vec<HookHandle>) {
        let mut grouped: HashMap<String, Vec<HookHandle>> = HashMap::new();
        for handle in handles {
            grouped.entry(handle.name.clone()).or_default().push(handle);
        }
        for list in grouped.values_mut() {
            // `sort_by_key` is stable, preserving insertion order within a
            // priority — descending priority means we sort by negated key.
            list.sort_by_key(|h| std::cmp::Reverse(h.priority));
        }
        *self.index.write() = grouped;

        let callbacks: Vec<_> = self.callbacks.read().iter().map(clone_callback).collect();
        for callback in callbacks {
            match callback {
                RefreshCallback::Sync(f) => f(),
                RefreshCallback::Async(f) => f().await,
            }
        }
    }

    fn handles_for(&self, name: &str) -> Vec<HookHandle> {
        self.index.read().get(name).cloned().unwrap_or_default()
    }

    /// `execute_hook(name, args, context)` (§4.4).
    ///
    /// - No registered handle: returns `args[0]` if supplied, else `None`.
    /// - Empty `args`: no-arg pipeline — every handle is invoked for effect
    ///   only, in priority order; a failing handle is logged and skipped.
    /// - Non-empty `args`: piped pipeline — `args[0]` is the piped value;
    ///   each handle receives a deep copy of the piped value and the
    ///   trailing arguments, and may return a new piped value (`None` means
    ///   "keep the previous value").
    pub async fn execute_hook(
        &self,
        name: &str,
        mut args: Vec<serde_json::Value>,
        context: DispatchContext,
    ) -> Option<serde_json::Value> {
        let handles = self.handles_for(name);
        if handles.is_empty() {
            return if args.is_empty() { None } else { Some(args.remove(0)) };
        }

        if args.is_empty() {
            for handle in &handles {
                let call = HookCall::bare(context.clone());
                if let Err(err) = handle.handler.clone()(call).await {
                    log_handle_failure(handle, &err);
                }
            }
            return None;
        }

        let mut piped = args.remove(0);
        let trailing = args;
        for handle in &handles {
            // Deep copy per handle: a handle must not observe another
            // handle's mutations (§4.4, §5).
            let call = HookCall {
                dispatch: context.clone(),
                piped: Some(piped.clone()),
                args: trailing.clone(),
                task_id: None,
                payload_ref: None,
                spawned_children: Arc::new(parking_lot::Mutex::new(Vec::new())),
            };
            match handle.handler.clone()(call).await {
                Ok(outcome) => {
                    if let Some(next) = outcome.into_value() {
                        piped = next;
                    }
                }
                Err(err) => log_handle_failure(handle, &err),
            }
        }
        Some(piped)
    }

    /// Resolve a `(plugin_id, hook)` pair to the handle that would execute
    /// it, used by the task engines (C5/C6) which invoke exactly one handle
    /// per task rather than a full pipeline.
    pub fn resolve(&self, plugin_id: &str, hook: &str) -> Option<HookHandle> {
        self.handles_for(hook)
            .into_iter()
            .find(|h| h.plugin_id.as_deref() == Some(plugin_id))
    }
}

fn clone_callback(cb: &RefreshCallback) -> RefreshCallback {
    match cb {
        RefreshCallback::Sync(f) => RefreshCallback::Sync(f.clone()),
        RefreshCallback::Async(f) => RefreshCallback::Async(f.clone()),
    }
}

fn log_handle_failure(handle: &HookHandle, err: &CoreError) {
    tracing::warn!(
        hook = %handle.name,
        plugin_id = ?handle.plugin_id,
        error = %err,
        "hook handle failed; pipeline continues with next handle"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn handle(name: &str, priority: i32, plugin_id: &str, f: Arc<HookFn>) -> HookHandle {
        HookHandle {
            name: name.to_string(),
            priority,
            plugin_id: Some(plugin_id.to_string()),
            handler: f,
        }
    }

    #[tokio::test]
    async fn priority_pipeline_appends_in_descending_order() {
        let registry = HookRegistry::new();
        let high: Arc<HookFn> = Arc::new(|call: HookCall| {
            Box::pin(async move {
                let s = call.piped.unwrap().as_str().unwrap().to_string();
                Ok(HookOutcome::Value(Some(serde_json::json!(format!("{s} priority 3")))))
            })
        });
        let low: Arc<HookFn> = Arc::new(|call: HookCall| {
            Box::pin(async move {
                let s = call.piped.unwrap().as_str().unwrap().to_string();
                Ok(HookOutcome::Value(Some(serde_json::json!(format!("{s} priority 2")))))
            })
        });
        registry
            .refresh(vec![
                handle("greet", 3, "p1", high),
                handle("greet", 2, "p2", low),
            ])
            .await;

        let result = registry
            .execute_hook(
                "greet",
                vec![serde_json::json!("Priorities:")],
                DispatchContext::anonymous(),
            )
            .await;
        assert_eq!(result, Some(serde_json::json!("Priorities: priority 3 priority 2")));
    }

    #[tokio::test]
    async fn missing_hook_echoes_first_arg() {
        let registry = HookRegistry::new();
        let result = registry
            .execute_hook("nothing", vec![serde_json::json!(42)], DispatchContext::anonymous())
            .await;
        assert_eq!(result, Some(serde_json::json!(42)));

        let result_empty = registry
            .execute_hook("nothing", vec![], DispatchContext::anonymous())
            .await;
        assert_eq!(result_empty, None);
    }

    #[tokio::test]
    async fn failing_handle_does_not_block_the_next_one() {
        let registry = HookRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_1 = calls.clone();
        let failing: Arc<HookFn> = Arc::new(move |_call: HookCall| {
            let calls = calls_1.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CoreError::hook_execution_error("boom", "always fails"))
            })
        });
        let calls_2 = calls.clone();
        let succeeding: Arc<HookFn> = Arc::new(move |_call: HookCall| {
            let calls = calls_2.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(HookOutcome::Value(None))
            })
        });
        registry
            .refresh(vec![
                handle("pipe", 2, "p1", failing),
                handle("pipe", 1, "p2", succeeding),
            ])
            .await;

        registry
            .execute_hook("pipe", vec![], DispatchContext::anonymous())
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dispatch_context_resolution_matches_two_failure_modes() {
        let ctx = DispatchContext::anonymous();
        assert!(matches!(
            ctx.resolve_caller(&[]).unwrap_err().code(),
            crate::error::ErrorCode::UnknownCallerContext
        ));

        let ctx = DispatchContext::new("ghost");
        assert!(matches!(
            ctx.resolve_caller(&["known".to_string()]).unwrap_err().code(),
            crate::error::ErrorCode::PluginNotFound
        ));

        let ctx = DispatchContext::new("known");
        assert_eq!(ctx.resolve_caller(&["known".to_string()]).unwrap(), "known");
    }
}
