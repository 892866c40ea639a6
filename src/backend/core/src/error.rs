//! System-error taxonomy for Flowplug Core.
//!
//! §7 of the design draws a line between two disjoint failure classes:
//!
//! - *Expected states* (empty input, not-found, no-results, ...) are reported
//!   through [`crate::result::ResultEnvelope`] and never raised as exceptions.
//! - *System errors* (malformed manifests, unresolved hooks, backend faults)
//!   are raised as [`CoreError`], a typed enum with stable categories clients
//!   can match on.
//!
//! Hook-pipeline failures are a deliberate exception to "errors propagate":
//! [`crate::hooks::HookRegistry::execute_hook`] *catches* [`CoreError`] per
//! handle, logs it, and keeps the pipeline moving. See module docs there.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// A specialized `Result` for Flowplug Core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Machine-readable error codes, matching §7's category list one-for-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// A manifest file is missing, unparsable, or fails normalization.
    ManifestInvalid,
    /// A plugin failed discovery, dependency install, or module loading.
    PluginLoadFailed,
    /// The dispatcher could not resolve the plugin id of the calling hook.
    UnknownCallerContext,
    /// A resolved plugin id has no corresponding registry entry.
    PluginNotFound,
    /// A hook raised while executing inside a task (wraps the plugin error).
    HookExecutionError,
    /// The sync/async engine was constructed without a task store.
    TaskStoreMissing,
    /// The sync/async engine was constructed without a task queue.
    TaskQueueMissing,
    /// `(plugin_id, hook)` did not resolve to any registered handle.
    HookResolutionFailed,
    /// A query spec or filter AST node is structurally malformed.
    InvalidShape,
    /// A capability, operator, or feature is not supported by the backend.
    Unsupported,
    /// A field referenced a query spec is not in the relevant allow-list.
    FieldNotAllowed,
    /// A pluggable store/queue/installer backend failed for reasons outside
    /// the engine's control (I/O, subprocess, serialization).
    BackendFailure,
    /// Catch-all for faults with no more specific category.
    Internal,
}

impl ErrorCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ManifestInvalid => "manifest_invalid",
            Self::PluginLoadFailed => "plugin_load_failed",
            Self::UnknownCallerContext => "unknown_caller_context",
            Self::PluginNotFound => "plugin_not_found",
            Self::HookExecutionError => "hook_execution_error",
            Self::TaskStoreMissing => "task_store_missing",
            Self::TaskQueueMissing => "task_queue_missing",
            Self::HookResolutionFailed => "hook_resolution_failed",
            Self::InvalidShape => "invalid_shape",
            Self::Unsupported => "unsupported",
            Self::FieldNotAllowed => "field_not_allowed",
            Self::BackendFailure => "backend_failure",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured context attached to a [`CoreError`], mirroring §7's "message and
/// optional context map" shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorContext {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, serde_json::Value>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.into(), v);
        }
        self
    }
}

/// The system-error type for Flowplug Core.
#[derive(Error, Debug)]
#[error("[{code}] {message}")]
pub struct CoreError {
    code: ErrorCode,
    message: String,
    context: ErrorContext,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl CoreError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.context = std::mem::take(&mut self.context).with(key, value);
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    /// Log this error at the severity its category implies.
    pub fn log(&self) {
        match self.code {
            ErrorCode::Internal | ErrorCode::BackendFailure => {
                tracing::error!(
                    code = %self.code,
                    message = %self.message,
                    context = ?self.context,
                    source = ?self.source,
                    "system error"
                );
            }
            ErrorCode::PluginLoadFailed | ErrorCode::HookExecutionError => {
                tracing::warn!(code = %self.code, message = %self.message, "recoverable system error");
            }
            _ => {
                tracing::debug!(code = %self.code, message = %self.message, "expected system error");
            }
        }
    }

    // Convenience constructors, one per §4 component that raises exceptions.

    pub fn manifest_invalid(path: impl Into<String>, details: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::ManifestInvalid,
            format!("invalid manifest at {}: {}", path, details.into()),
        )
        .with_field("path", &path)
    }

    pub fn plugin_load_failed(plugin_id: impl Into<String>, reason: impl Into<String>) -> Self {
        let plugin_id = plugin_id.into();
        Self::new(
            ErrorCode::PluginLoadFailed,
            format!("failed to load plugin '{}': {}", plugin_id, reason.into()),
        )
        .with_field("plugin_id", &plugin_id)
    }

    pub fn unknown_caller_context() -> Self {
        Self::new(
            ErrorCode::UnknownCallerContext,
            "no hook frame matched the current dispatch context",
        )
    }

    pub fn plugin_not_found(plugin_id: impl Into<String>) -> Self {
        let plugin_id = plugin_id.into();
        Self::new(
            ErrorCode::PluginNotFound,
            format!("plugin not found: {}", plugin_id),
        )
        .with_field("plugin_id", &plugin_id)
    }

    pub fn hook_execution_error(hook: impl Into<String>, reason: impl Into<String>) -> Self {
        let hook = hook.into();
        Self::new(
            ErrorCode::HookExecutionError,
            format!("hook '{}' raised: {}", hook, reason.into()),
        )
        .with_field("hook", &hook)
    }

    pub fn task_store_missing() -> Self {
        Self::new(ErrorCode::TaskStoreMissing, "engine has no task store configured")
    }

    pub fn task_queue_missing() -> Self {
        Self::new(ErrorCode::TaskQueueMissing, "engine has no task queue configured")
    }

    pub fn hook_resolution_failed(plugin_id: impl Into<String>, hook: impl Into<String>) -> Self {
        let plugin_id = plugin_id.into();
        let hook = hook.into();
        Self::new(
            ErrorCode::HookResolutionFailed,
            format!("no handle registered for ({}, {})", plugin_id, hook),
        )
        .with_field("plugin_id", &plugin_id)
        .with_field("hook", &hook)
    }

    pub fn invalid_shape(path: impl Into<String>, reason: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::InvalidShape,
            format!("{} at {}", reason.into(), path),
        )
        .with_field("path", &path)
    }

    pub fn unsupported(path: impl Into<String>, what: impl Into<String>) -> Self {
        let path = path.into();
        let what = what.into();
        Self::new(
            ErrorCode::Unsupported,
            format!("unsupported {} at {}", what, path),
        )
        .with_field("path", &path)
        .with_field("what", &what)
    }

    pub fn field_not_allowed(path: impl Into<String>, field: impl Into<String>) -> Self {
        let path = path.into();
        let field = field.into();
        Self::new(
            ErrorCode::FieldNotAllowed,
            format!("field '{}' not in allow-list at {}", field, path),
        )
        .with_field("path", &path)
        .with_field("field", &field)
    }

    pub fn backend_failure(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::BackendFailure, reason.into())
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, reason.into())
    }
}

impl From<std::io::Error> for CoreError {
    fn from(error: std::io::Error) -> Self {
        Self::new(ErrorCode::BackendFailure, error.to_string()).with_source(error)
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(ErrorCode::InvalidShape, error.to_string()).with_source(error)
    }
}

impl From<toml::de::Error> for CoreError {
    fn from(error: toml::de::Error) -> Self {
        Self::new(ErrorCode::ManifestInvalid, error.to_string()).with_source(error)
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(error: config::ConfigError) -> Self {
        Self::new(ErrorCode::Internal, format!("configuration error: {}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_message() {
        let err = CoreError::plugin_not_found("embedder-x");
        let text = err.to_string();
        assert!(text.contains("plugin_not_found"));
        assert!(text.contains("embedder-x"));
    }

    #[test]
    fn context_fields_round_trip() {
        let err = CoreError::hook_resolution_failed("p1", "split");
        assert_eq!(
            err.context().fields.get("plugin_id").and_then(|v| v.as_str()),
            Some("p1")
        );
        assert_eq!(
            err.context().fields.get("hook").and_then(|v| v.as_str()),
            Some("split")
        );
    }
}
