//! Plugin discovery and lifecycle commands.
//!
//! The CLI process has no persistent plugin registry of its own — each
//! invocation discovers, and where asked registers/activates, against a
//! fresh in-process [`PluginRegistry`]. This mirrors running the host's own
//! discovery/activation pipeline once, for inspection, rather than talking
//! to a long-lived daemon over a wire protocol.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Subcommand;
use flowplug_core::plugins::{loader, manifest, DependencyInstaller, PluginFactoryRegistry, PluginRegistry};

use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum PluginCommands {
    /// List plugin directories discoverable under the configured plugins dir
    List {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Resolve and print a plugin's manifest without activating it
    Manifest {
        /// Path to the plugin's directory
        path: PathBuf,
    },
    /// Register and activate a discovered plugin, reporting the hooks it contributes
    Activate {
        /// Plugin id (its directory name, or entry-point name)
        id: String,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

pub async fn execute(cmd: PluginCommands, format: OutputFormat) -> Result<()> {
    match cmd {
        PluginCommands::List { dir } => list(dir, format),
        PluginCommands::Manifest { path } => show_manifest(path, format),
        PluginCommands::Activate { id, dir } => activate(id, dir, format).await,
    }
}

fn plugins_dir(override_dir: Option<PathBuf>) -> PathBuf {
    override_dir.unwrap_or_else(|| flowplug_core::config::Config::load().unwrap_or_default().plugins.dir)
}

fn list(dir: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let root = plugins_dir(dir);
    let discovered = loader::discover(Vec::new(), &root, None);

    if discovered.is_empty() {
        output::print_info(&format!("no plugins discovered under {}", root.display()));
        return Ok(());
    }

    match format {
        OutputFormat::Table => {
            output::print_header(&format!("{} plugin(s) discovered", discovered.len()));
            for plugin in &discovered {
                println!("  {}  ({:?})  {}", plugin.id, plugin.source, plugin.path.display());
            }
        }
        OutputFormat::Json => {
            let rows: Vec<_> = discovered
                .iter()
                .map(|p| serde_json::json!({"id": p.id, "path": p.path.display().to_string(), "source": format!("{:?}", p.source)}))
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Yaml => {
            let rows: Vec<_> = discovered
                .iter()
                .map(|p| serde_json::json!({"id": p.id, "path": p.path.display().to_string(), "source": format!("{:?}", p.source)}))
                .collect();
            println!("{}", serde_yaml::to_string(&rows)?);
        }
    }
    Ok(())
}

fn show_manifest(path: PathBuf, format: OutputFormat) -> Result<()> {
    let resolved = manifest::resolve(&path, "flowplug-host", None).map_err(|e| anyhow!(e.to_string()))?;

    match format {
        OutputFormat::Table => {
            output::print_header(&format!("manifest: {}", resolved.name));
            output::print_detail("version", &resolved.version);
            output::print_detail("description", &resolved.description);
            output::print_detail("author", &format!("{} <{}>", resolved.author_name, resolved.author_email));
            output::print_detail("license", &resolved.license);
            output::print_detail("keywords", &resolved.keywords.join(", "));
            if !resolved.urls.is_empty() {
                output::print_detail("urls", &resolved.urls.join(", "));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&resolved)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&resolved)?),
    }
    Ok(())
}

async fn activate(id: String, dir: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let root = plugins_dir(dir);
    let discovered = loader::discover(Vec::new(), &root, None);
    let plugin = discovered
        .into_iter()
        .find(|p| p.id == id)
        .ok_or_else(|| anyhow!("plugin '{id}' not found under {}", root.display()))?;

    let resolved_manifest = manifest::resolve(&plugin.path, "flowplug-host", None).map_err(|e| anyhow!(e.to_string()))?;

    // No plugin factories are statically linked into the CLI binary; a host
    // that links concrete plugin crates registers them here instead.
    let factories = PluginFactoryRegistry::new();
    let module = factories
        .build(&plugin.id, &plugin.path)
        .map_err(|e| anyhow!("{e} (the `flowplug` CLI links no plugin factories of its own)"))?;

    let registry = PluginRegistry::new();
    registry.register(plugin.id.clone(), plugin.path.clone(), resolved_manifest, module).map_err(|e| anyhow!(e.to_string()))?;
    let installer = DependencyInstaller::detect_default(false).await;
    registry.activate(&plugin.id, &installer).await.map_err(|e| anyhow!(e.to_string()))?;

    let hooks = registry.all_active_hooks();
    match format {
        OutputFormat::Table => {
            output::print_success(&format!("activated '{}' ({} hook(s))", plugin.id, hooks.len()));
            for hook in &hooks {
                println!("  {} (priority {})", hook.name, hook.priority);
            }
        }
        OutputFormat::Json => {
            let names: Vec<_> = hooks.iter().map(|h| serde_json::json!({"name": h.name, "priority": h.priority})).collect();
            println!("{}", serde_json::to_string_pretty(&names)?);
        }
        OutputFormat::Yaml => {
            let names: Vec<_> = hooks.iter().map(|h| serde_json::json!({"name": h.name, "priority": h.priority})).collect();
            println!("{}", serde_yaml::to_string(&names)?);
        }
    }
    Ok(())
}
