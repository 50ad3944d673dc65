// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `minions render <file>`: print what the daemon would build for an agent.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use minions_orchestrator_core::domain::agent::AgentMetadata;
use minions_orchestrator_core::domain::node_config::NodeConfig;
use minions_orchestrator_core::infrastructure::wrapper_synthesizer::{BuildBundle, WrapperSynthesizer};

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Python source file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Agent display name (also determines the agent id)
    #[arg(long)]
    pub name: String,

    #[arg(long, default_value = "")]
    pub description: String,

    #[arg(long, default_value = "custom")]
    pub model_type: String,

    /// Extra pip requirement (repeatable)
    #[arg(long = "requirement", value_name = "REQUIREMENT")]
    pub requirements: Vec<String>,

    /// Also print the Dockerfile and requirements.txt
    #[arg(long)]
    pub dockerfile: bool,
}

pub async fn handle_command(args: RenderArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = NodeConfig::load_or_default(config_path).context("Failed to load configuration")?;
    let source = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {:?}", args.file))?;

    let mut metadata = AgentMetadata::new(args.name, args.description, args.model_type);
    metadata.requirements = args.requirements;

    let synthesizer = WrapperSynthesizer::new(config.runtime.base_image.clone(), config.runtime.internal_port);
    let bundle = synthesizer
        .bundle(&source, &metadata)
        .context("Failed to generate agent wrapper")?;

    if args.dockerfile {
        for (name, content) in bundle.files() {
            println!("{}", format!("# ---- {} ----", name).dimmed());
            println!("{}", content);
        }
    } else {
        println!("{}", format!("# ---- {} ({}) ----", BuildBundle::AGENT_FILE, metadata.agent_id()).dimmed());
        println!("{}", bundle.agent_source);
    }

    Ok(())
}
