//! Flowplug Host — the process that loads configuration, brings up
//! telemetry, discovers and activates plugins, then drives the task
//! engine's worker loop until shutdown.
//!
//! No HTTP surface is exposed here: the host is a pipeline runner, not a
//! request-serving service. Plugins that want an outward-facing API are
//! expected to bring their own.

use std::sync::Arc;

use flowplug_core::config::Config;
use flowplug_core::plugins::{loader, manifest, DependencyInstaller, PluginFactoryRegistry, PluginRegistry};
use flowplug_core::tasks::{self, SyncEngine, WorkerLoopConfig};
use flowplug_core::telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("warning: could not load config ({e}); using defaults");
        Config::default()
    });

    let telemetry_config = TelemetryConfig {
        service_name: config.telemetry.service_name.clone().unwrap_or_else(|| "flowplug-host".to_string()),
        environment: config.telemetry.environment.clone().unwrap_or_else(|| "development".to_string()),
        ..TelemetryConfig::default()
    };
    let telemetry = init_telemetry(&telemetry_config)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting flowplug host");

    // Plugin factories for statically linked plugin crates are registered
    // here by whoever builds this binary for a concrete deployment; an
    // empty registry is a valid (if inert) host.
    let factories = PluginFactoryRegistry::new();

    let discovered = loader::discover(Vec::new(), &config.plugins.dir, None);
    tracing::info!(count = discovered.len(), "plugin discovery complete");

    let plugin_registry = Arc::new(PluginRegistry::new());
    let installer = DependencyInstaller::detect_default(false).await;

    for plugin in discovered {
        let resolved_manifest = match manifest::resolve(&plugin.path, "flowplug-host", None) {
            Ok(m) => m,
            Err(err) => {
                tracing::warn!(plugin = %plugin.id, error = %err, "manifest resolution failed; skipping");
                continue;
            }
        };

        let module = match factories.build(&plugin.id, &plugin.path) {
            Ok(m) => m,
            Err(err) => {
                tracing::debug!(plugin = %plugin.id, error = %err, "no linked factory for discovered plugin; skipping");
                continue;
            }
        };

        if let Err(err) = plugin_registry.register(plugin.id.clone(), plugin.path.clone(), resolved_manifest, module) {
            tracing::warn!(plugin = %plugin.id, error = %err, "plugin registration failed");
            continue;
        }

        if let Err(err) = plugin_registry.activate(&plugin.id, &installer).await {
            tracing::warn!(plugin = %plugin.id, error = %err, "plugin activation failed");
        }
    }

    let hooks = Arc::new(flowplug_core::hooks::HookRegistry::new());
    hooks.refresh(plugin_registry.all_active_hooks()).await;

    let (store, queue) = tasks::resolve_in_memory_backends(
        config.engine.task_store_default.as_deref(),
        config.engine.task_queue_default.as_deref(),
    )?;
    let engine = SyncEngine::new(store, queue, hooks.clone());

    let worker_config = WorkerLoopConfig {
        max_iterations: config.engine.max_iterations,
        idle_sleep: std::time::Duration::from_millis(config.engine.idle_sleep_ms),
    };

    tracing::info!("entering sync engine worker loop");
    let engine_task = tokio::task::spawn_blocking(move || engine.worker_loop(worker_config));

    tokio::select! {
        result = engine_task => {
            result??;
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    telemetry.shutdown();
    tracing::info!("flowplug host shutdown complete");

    Ok(())
}

/// Wait for `SIGINT`/`SIGTERM`.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
