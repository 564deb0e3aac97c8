//! Command-line interface definitions for the broker.
//!
//! This module contains the CLI argument parsing structures and enums
//! used by the `kubegate` binary.

use std::env;

use clap::{Parser, Subcommand, ValueEnum};

/// Top-level command-line interface definition.
#[derive(Debug, Parser)]
#[command(name = "kubegate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the login web interface.
    Serve(ServeArgs),

    /// Load and validate the configuration file, then exit.
    CheckConfig {
        /// Path to the configuration file
        #[arg(short, long, default_value = "kubegate.toml", env = "KUBEGATE_CONFIG")]
        config: String,
    },
}

/// Arguments for the serve command.
#[derive(Debug, Parser)]
pub struct ServeArgs {
    /// Path to the configuration file
    #[arg(short, long, default_value = "kubegate.toml", env = "KUBEGATE_CONFIG")]
    pub config: String,

    /// Optional override for the listen port (overrides the port of `listen` in config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Optional override for the bind address (overrides the address of `listen` in config)
    #[arg(long)]
    pub bind: Option<String>,

    /// Format of the log output
    #[arg(long, value_enum, default_value_t = LogFormat::Compact, env = "KUBEGATE_LOG_FORMAT")]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
    Pretty,
}
