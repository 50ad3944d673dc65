// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use minions_orchestrator_core::application::agent::DeployRequest;
use minions_orchestrator_core::domain::agent::AgentMetadata;

use crate::daemon::{check_daemon_running, DaemonClient, DaemonStatus, DEFAULT_HOST, DEFAULT_PORT};

#[derive(Subcommand)]
pub enum AgentCommand {
    /// Deploy an agent from a Python source file
    Deploy {
        /// Python source file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Metadata as a YAML or JSON file
        #[arg(long, value_name = "FILE", conflicts_with = "name")]
        metadata: Option<PathBuf>,

        /// Agent display name (when no metadata file is given)
        #[arg(long, required_unless_present = "metadata")]
        name: Option<String>,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long, default_value = "custom")]
        model_type: String,

        /// Replace a running agent with the same id
        #[arg(long)]
        replace: bool,
    },

    /// List running agents
    List,

    /// Show the live status of an agent
    Status {
        #[arg(value_name = "AGENT_ID")]
        agent_id: String,
    },

    /// Stop and remove an agent
    Stop {
        #[arg(value_name = "AGENT_ID")]
        agent_id: String,
    },

    /// Send inputs to an agent's predict endpoint
    Predict {
        #[arg(value_name = "AGENT_ID")]
        agent_id: String,

        /// Input values, passed in order
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<String>,
    },
}

pub async fn handle_command(command: AgentCommand, host: Option<&str>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or(DEFAULT_HOST);
    let port = port.unwrap_or(DEFAULT_PORT);

    match check_daemon_running(host, port).await? {
        DaemonStatus::Running => {}
        DaemonStatus::Unhealthy { error } => {
            println!("{}", format!("⚠ Daemon is reachable but unhealthy: {}", error).yellow());
            return Ok(());
        }
        DaemonStatus::Stopped => {
            println!("{}", "Agent management requires the daemon to be running.".red());
            println!("Run 'minions serve' to start the daemon.");
            return Ok(());
        }
    }

    let client = DaemonClient::new(host, port)?;

    match command {
        AgentCommand::Deploy {
            file,
            metadata,
            name,
            description,
            model_type,
            replace,
        } => {
            let metadata = match (metadata, name) {
                (Some(path), _) => load_metadata(&path).await?,
                (None, Some(name)) => AgentMetadata::new(name, description, model_type),
                (None, None) => anyhow::bail!("Either --metadata or --name is required"),
            };
            deploy_agent(&client, file, metadata, replace).await
        }
        AgentCommand::List => list_agents(&client).await,
        AgentCommand::Status { agent_id } => agent_status(&client, &agent_id).await,
        AgentCommand::Stop { agent_id } => stop_agent(&client, &agent_id).await,
        AgentCommand::Predict { agent_id, inputs } => predict(&client, &agent_id, inputs).await,
    }
}

/// YAML is a superset of JSON, so one parser covers both formats.
async fn load_metadata(path: &Path) -> Result<AgentMetadata> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read metadata file {:?}", path))?;
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse metadata file {:?}", path))
}

async fn deploy_agent(client: &DaemonClient, file: PathBuf, metadata: AgentMetadata, replace: bool) -> Result<()> {
    let source = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {:?}", file))?;

    println!("Deploying {} (this builds an image and may take a while)...", metadata.name.bold());

    let request = DeployRequest {
        source,
        metadata,
        replace,
    };
    let response = client.deploy_agent(&request).await?;

    println!("{}", format!("✓ Agent deployed: {}", response.agent_id).green());
    println!("  Service:  {}", response.service_url);
    println!("  Endpoint: {}", response.api_endpoint);
    for warning in &response.warnings {
        println!("{}", format!("⚠ {}", warning).yellow());
    }

    Ok(())
}

async fn list_agents(client: &DaemonClient) -> Result<()> {
    let agents = client.list_agents().await?;

    if agents.is_empty() {
        println!("{}", "No agents running".yellow());
        return Ok(());
    }

    println!("{} agents running:", agents.len());
    println!("{:<24} {:<24} {:<10} {}", "ID", "NAME", "VERSION", "ENDPOINT");

    for agent in agents {
        println!(
            "{:<24} {:<24} {:<10} {}",
            agent.id,
            agent.metadata.name.bold(),
            agent.metadata.version,
            agent.api_endpoint
        );
    }

    Ok(())
}

async fn agent_status(client: &DaemonClient, agent_id: &str) -> Result<()> {
    match client.agent_status(agent_id).await? {
        Some(record) => {
            println!("{}", serde_yaml::to_string(&record)?);
        }
        None => {
            println!("{}", format!("Agent '{}' not found", agent_id).yellow());
        }
    }
    Ok(())
}

async fn stop_agent(client: &DaemonClient, agent_id: &str) -> Result<()> {
    if client.stop_agent(agent_id).await? {
        println!("{}", format!("✓ Agent '{}' stopped", agent_id).green());
    } else {
        println!("{}", format!("Agent '{}' was not running", agent_id).yellow());
    }
    Ok(())
}

async fn predict(client: &DaemonClient, agent_id: &str, inputs: Vec<String>) -> Result<()> {
    let envelope = client.predict(agent_id, inputs).await?;
    println!("{}", serde_json::to_string_pretty(&envelope)?);

    if let Some(error) = &envelope.error {
        anyhow::bail!("Agent reported {}: {}", error.code, error.message);
    }
    Ok(())
}
