//! Configuration surface consumed by the core (§6).
//!
//! The spec treats configuration as "a key/value lookup surface" owned by an
//! external collaborator; this module is the thin typed layer the host
//! process and CLI load at startup, following the teacher's
//! `config`+`dotenvy`+`toml` stack with environment-variable overrides.

use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration object, loaded from an optional TOML file plus
/// `FLOWPLUG__*` environment overrides (double underscore as the nested-key
/// separator, matching the teacher's convention).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub plugins: PluginsConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub redis: RedisConfig,

    #[serde(default)]
    pub telemetry: TelemetryRef,
}

/// Plugin discovery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginsConfig {
    /// Filesystem root under which one directory per plugin lives (§6).
    #[serde(default = "default_plugins_dir")]
    pub dir: PathBuf,

    /// Entry-point group name used for installed-package discovery (§4.3,
    /// §6). Installed packages win over filesystem directories with the
    /// same id.
    #[serde(default = "default_entry_point_group")]
    pub entry_point_group: String,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            dir: default_plugins_dir(),
            entry_point_group: default_entry_point_group(),
        }
    }
}

fn default_plugins_dir() -> PathBuf {
    PathBuf::from("./plugins")
}

fn default_entry_point_group() -> String {
    "flowplug.plugins".to_string()
}

/// The §6 configuration surface consumed by the task engine: named backend
/// selection, left unresolved here (resolving a name to a concrete
/// `TaskStore`/`TaskQueue` instance is the host process's job, not the
/// engine's — see §9's "replace global state with constructor injection").
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// `task_store_default` (§6): named backend selection for the sync
    /// engine's task store.
    #[serde(default)]
    pub task_store_default: Option<String>,

    /// `task_queue_default` (§6): named backend selection for the sync
    /// engine's task queue.
    #[serde(default)]
    pub task_queue_default: Option<String>,

    /// `embedder_default` (§6).
    #[serde(default)]
    pub embedder_default: Option<String>,

    /// `repository_default` and `repository_default_<purpose>` (§6),
    /// collected as a purpose -> name map; the bare `repository_default`
    /// key (no purpose suffix) is stored under the empty string.
    #[serde(default)]
    pub repository_default: std::collections::HashMap<String, String>,

    /// Worker loop tuning for the sync engine's `worker_loop` (§4.5):
    /// iteration cap (`None` = unbounded) and sleep interval between idle
    /// polls (non-positive = exit on first idle, per §4.5).
    #[serde(default)]
    pub max_iterations: Option<u64>,

    #[serde(default = "default_idle_sleep_ms")]
    pub idle_sleep_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            task_store_default: None,
            task_queue_default: None,
            embedder_default: None,
            repository_default: std::collections::HashMap::new(),
            max_iterations: None,
            idle_sleep_ms: default_idle_sleep_ms(),
        }
    }
}

fn default_idle_sleep_ms() -> u64 {
    200
}

/// Redis connection details for the C6 async job queue backend.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Time-bounded dequeue timeout in seconds (§4.6, §5).
    #[serde(default = "default_dequeue_timeout_secs")]
    pub dequeue_timeout_secs: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            dequeue_timeout_secs: default_dequeue_timeout_secs(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_dequeue_timeout_secs() -> u64 {
    5
}

/// Delegates to [`crate::telemetry::TelemetryConfig`] for service identity;
/// kept as a thin re-export point so `Config` has one place to load from.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TelemetryRef {
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
}

impl Config {
    /// Load configuration from environment variables (prefix `FLOWPLUG`,
    /// `__` nested separator), optionally layered on top of a config file.
    pub fn load() -> crate::error::Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::Environment::with_prefix("FLOWPLUG").separator("__"));
        let cfg: Config = builder.build()?.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path, then apply environment overrides.
    pub fn from_file(path: &str) -> crate::error::Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("FLOWPLUG").separator("__"));
        let cfg: Config = builder.build()?.try_deserialize()?;
        Ok(cfg)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plugins: PluginsConfig::default(),
            engine: EngineConfig::default(),
            redis: RedisConfig::default(),
            telemetry: TelemetryRef::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.plugins.dir, PathBuf::from("./plugins"));
        assert!(cfg.engine.task_store_default.is_none());
        assert_eq!(cfg.redis.dequeue_timeout_secs, 5);
    }
}
