// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Smart Minions Orchestrator CLI
//!
//! The `minions` binary hosts the agent deployment daemon and talks to it.
//!
//! ## Commands
//!
//! - `minions serve` - Run the HTTP daemon (cleans up every agent on shutdown)
//! - `minions validate <file>` - Check an agent source file locally
//! - `minions render <file>` - Print the generated wrapper and Dockerfile
//! - `minions config show|validate` - Configuration management
//! - `minions agent deploy|list|status|stop|predict` - Talk to a running daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use minions_orchestrator::commands::{self, AgentCommand, ConfigCommand, RenderArgs};
use minions_orchestrator::daemon;

/// Smart Minions - deploy gradio agents as isolated services
#[derive(Parser)]
#[command(name = "minions")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "MINIONS_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// HTTP API port (default: network.port from config)
    #[arg(long, global = true, env = "MINIONS_PORT")]
    port: Option<u16>,

    /// HTTP API host (default: network.bind_address from config)
    #[arg(long, global = true, env = "MINIONS_HOST")]
    host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "MINIONS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, env = "MINIONS_LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Compact,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the deployment daemon in the foreground
    #[command(name = "serve")]
    Serve,

    /// Check that an agent source file satisfies the structural contract
    #[command(name = "validate")]
    Validate {
        /// Python source file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print the wrapper generated for an agent source file
    #[command(name = "render")]
    Render(RenderArgs),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Agent management against a running daemon
    #[command(name = "agent")]
    Agent {
        #[command(subcommand)]
        command: AgentCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is not an error
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_format)?;

    match cli.command {
        Some(Commands::Serve) => {
            info!("Starting Smart Minions orchestrator daemon");
            daemon::start_daemon(cli.config, cli.host, cli.port).await
        }
        Some(Commands::Validate { file }) => commands::validate::handle_command(file).await,
        Some(Commands::Render(args)) => commands::render::handle_command(args, cli.config).await,
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        Some(Commands::Agent { command }) => {
            commands::agent::handle_command(command, cli.host.as_deref(), cli.port).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}
