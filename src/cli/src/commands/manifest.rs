//! Standalone manifest resolution, independent of plugin registration.
//!
//! Thin wrapper kept separate from [`crate::commands::plugin`] because
//! inspecting a manifest needs no plugins directory, no discovery pass, and
//! no factory — just a directory path.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Subcommand;
use flowplug_core::plugins::manifest;

use crate::output::OutputFormat;

#[derive(Subcommand)]
pub enum ManifestCommands {
    /// Resolve and print the manifest for a plugin directory
    Show {
        /// Path to the plugin's directory
        path: PathBuf,
    },
}

pub async fn execute(cmd: ManifestCommands, format: OutputFormat) -> Result<()> {
    match cmd {
        ManifestCommands::Show { path } => {
            let resolved = manifest::resolve(&path, "flowplug-host", None).map_err(|e| anyhow!(e.to_string()))?;
            match format {
                OutputFormat::Table => {
                    crate::output::print_header(&format!("manifest: {}", resolved.name));
                    crate::output::print_detail("version", &resolved.version);
                    crate::output::print_detail("description", &resolved.description);
                    crate::output::print_detail("license", &resolved.license);
                    if let Some(min) = &resolved.min_host_version {
                        crate::output::print_detail("min_host_version", min);
                    }
                    if let Some(max) = &resolved.max_host_version {
                        crate::output::print_detail("max_host_version", max);
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&resolved)?),
                OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&resolved)?),
            }
            Ok(())
        }
    }
}
