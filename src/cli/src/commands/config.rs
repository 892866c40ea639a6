//! Configuration inspection command.

use anyhow::Result;
use clap::Subcommand;
use flowplug_core::config::Config;

use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration (file + environment overrides)
    Show,
}

pub async fn execute(cmd: ConfigCommands, format: OutputFormat) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            let config = Config::load().unwrap_or_default();
            match format {
                OutputFormat::Table => {
                    output::print_header("Flowplug configuration");
                    output::print_detail("plugins.dir", &config.plugins.dir.display().to_string());
                    output::print_detail("plugins.entry_point_group", &config.plugins.entry_point_group);
                    output::print_detail(
                        "engine.task_store_default",
                        config.engine.task_store_default.as_deref().unwrap_or("(default: memory)"),
                    );
                    output::print_detail(
                        "engine.task_queue_default",
                        config.engine.task_queue_default.as_deref().unwrap_or("(default: memory)"),
                    );
                    output::print_detail("engine.idle_sleep_ms", &config.engine.idle_sleep_ms.to_string());
                    output::print_detail("redis.url", &config.redis.url);
                    output::print_detail("redis.dequeue_timeout_secs", &config.redis.dequeue_timeout_secs.to_string());
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&summarize(&config))?);
                }
                OutputFormat::Yaml => {
                    println!("{}", serde_yaml::to_string(&summarize(&config))?);
                }
            }
        }
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct ConfigSummary {
    plugins_dir: String,
    entry_point_group: String,
    task_store_default: Option<String>,
    task_queue_default: Option<String>,
    idle_sleep_ms: u64,
    redis_url: String,
    redis_dequeue_timeout_secs: u64,
}

fn summarize(config: &Config) -> ConfigSummary {
    ConfigSummary {
        plugins_dir: config.plugins.dir.display().to_string(),
        entry_point_group: config.plugins.entry_point_group.clone(),
        task_store_default: config.engine.task_store_default.clone(),
        task_queue_default: config.engine.task_queue_default.clone(),
        idle_sleep_ms: config.engine.idle_sleep_ms,
        redis_url: config.redis.url.clone(),
        redis_dequeue_timeout_secs: config.redis.dequeue_timeout_secs,
    }
}
