// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use minions_orchestrator_core::domain::node_config::NodeConfig;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the resolved configuration as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Write the default configuration to a file
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./minions-config.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output } => generate(&output).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = NodeConfig::load_or_default(config_override.clone()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. MINIONS_CONFIG_PATH: {}",
            std::env::var("MINIONS_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./minions-config.yaml");
        println!("  4. ~/.minions/config.yaml");
        println!("  5. /etc/minions/config.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", config.to_yaml_string()?);
        return Ok(());
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Runtime:".bold());
    println!(
        "  Docker socket: {}",
        config.runtime.docker_socket_path.as_deref().unwrap_or("(platform default)")
    );
    println!(
        "  Network mode: {}",
        config.runtime.network_mode.as_deref().unwrap_or("(engine default)")
    );
    println!("  Base image: {}", config.runtime.base_image);
    println!("  Internal port: {}", config.runtime.internal_port);
    println!("  Public host: {}", config.runtime.public_host);
    println!("  Image namespace: {}", config.runtime.image_namespace);
    println!("  Container prefix: {}", config.runtime.container_prefix);
    println!("  Workspace: {}", config.runtime.workspace_dir.display());
    println!();

    println!("{}", "Limits (per agent):".bold());
    println!("  Memory: {} MiB", config.limits.memory_mb);
    println!("  CPU: {} cores", config.limits.cpu_cores);
    println!();

    println!("{}", "Timeouts:".bold());
    println!("  Build: {}s", config.timeouts.build_seconds);
    println!("  Start: {}s", config.timeouts.start_seconds);
    println!("  Stop grace: {}s", config.timeouts.stop_grace_seconds);
    println!("  Predict: {}s", config.timeouts.predict_seconds);
    println!();

    println!("{}", "API:".bold());
    println!("  Listen: {}:{}", config.network.bind_address, config.network.port);
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = NodeConfig::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: &Path) -> Result<()> {
    let yaml = NodeConfig::default().to_yaml_string()?;

    tokio::fs::write(output, yaml)
        .await
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generated_config_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minions-config.yaml");

        generate(&path).await.unwrap();
        validate(Some(path.clone())).await.unwrap();

        let config = NodeConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.runtime.internal_port, 7860);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "limits:\n  memory_mb: 0\n").unwrap();

        assert!(validate(Some(path)).await.is_err());
    }
}
