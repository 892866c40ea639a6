//! Flowplug CLI — command-line interface for the Flowplug plugin runtime and
//! task engine.
//!
//! Talks directly to `flowplug_core` library types; there is no HTTP
//! surface between this binary and the runtime it inspects.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config, manifest, plugin, task};
use output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "flowplug",
    author = "Flowplug Contributors",
    version = "0.1.0",
    about = "Flowplug - plugin runtime and task engine CLI",
    long_about = "CLI tool for driving the Flowplug plugin runtime and task engine.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plugin discovery and lifecycle operations
    #[command(subcommand)]
    Plugin(plugin::PluginCommands),

    /// Manifest inspection
    #[command(subcommand)]
    Manifest(manifest::ManifestCommands),

    /// Task engine operations
    #[command(subcommand)]
    Task(task::TaskCommands),

    /// Configuration inspection
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let format = cli.output;

    let result = match cli.command {
        Commands::Plugin(cmd) => plugin::execute(cmd, format).await,
        Commands::Manifest(cmd) => manifest::execute(cmd, format).await,
        Commands::Task(cmd) => task::execute(cmd, format).await,
        Commands::Config(cmd) => config::execute(cmd, format).await,
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
