//! Subcommand implementations, one module per `flowplug <noun>` group.

pub mod config;
pub mod manifest;
pub mod plugin;
pub mod task;
