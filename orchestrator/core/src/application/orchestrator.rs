// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Build & Run Orchestrator
//!
//! Turns a [`BuildBundle`] into a running, resource-bounded container:
//!
//! 1. materialize the bundle under `<workspace>/<agent_id>/` and pack it
//! 2. build `<namespace>/agent-<agent_id>:latest` (the context directory is
//!    deleted afterwards, whatever the outcome)
//! 3. create and start `<prefix>-<agent_id>` with memory/CPU limits and the
//!    service port published to an ephemeral host port
//! 4. poll the container until the host port is bound
//!
//! Every failure tears down what was created before it is surfaced. Nothing
//! is retried.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::domain::agent::AgentId;
use crate::domain::deployment::{ContainerPlacement, ResourceLimits};
use crate::domain::node_config::NodeConfig;
use crate::domain::runtime::{ContainerId, ContainerRuntime, ContainerSpec, ContainerState, RuntimeError};
use crate::infrastructure::build_context::BuildContext;
use crate::infrastructure::wrapper_synthesizer::BuildBundle;

/// Container log lines attached to a start failure
const START_LOG_TAIL: usize = 50;

/// Label carrying the agent id on every managed container
pub const AGENT_LABEL: &str = "minions.agent_id";

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Failed to prepare build context: {0}")]
    Context(#[from] std::io::Error),

    #[error("Image build failed: {reason}")]
    BuildFailed { reason: String, log: String },

    #[error("Container failed to start: {reason}")]
    StartFailed { reason: String, log: String },

    #[error(transparent)]
    Runtime(RuntimeError),
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub workspace_dir: PathBuf,
    pub image_namespace: String,
    pub container_prefix: String,
    pub internal_port: u16,
    pub public_host: String,
    pub network_mode: Option<String>,
    pub build_timeout: Duration,
    pub start_timeout: Duration,
    pub stop_grace_secs: u32,
    pub port_poll_interval: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &NodeConfig) -> Self {
        Self {
            workspace_dir: config.runtime.workspace_dir.clone(),
            image_namespace: config.runtime.image_namespace.clone(),
            container_prefix: config.runtime.container_prefix.clone(),
            internal_port: config.runtime.internal_port,
            public_host: config.runtime.public_host.clone(),
            network_mode: config.runtime.network_mode.clone(),
            build_timeout: config.timeouts.build(),
            start_timeout: config.timeouts.start(),
            stop_grace_secs: config.timeouts.stop_grace_seconds,
            port_poll_interval: Duration::from_millis(250),
        }
    }
}

pub struct DeploymentOrchestrator {
    runtime: Arc<dyn ContainerRuntime>,
    settings: OrchestratorSettings,
}

impl DeploymentOrchestrator {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, settings: OrchestratorSettings) -> Self {
        Self { runtime, settings }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn image_name(&self, agent_id: &AgentId) -> String {
        format!("{}/agent-{}:latest", self.settings.image_namespace, agent_id)
    }

    pub fn container_name(&self, agent_id: &AgentId) -> String {
        format!("{}-{}", self.settings.container_prefix, agent_id)
    }

    pub fn service_url(&self, host_port: u16) -> String {
        format!("http://{}:{}", self.settings.public_host, host_port)
    }

    /// Build then start. The caller that needs to observe the intermediate
    /// `Built` state calls [`Self::build`] and [`Self::start`] separately.
    pub async fn deploy(
        &self,
        agent_id: &AgentId,
        bundle: &BuildBundle,
        limits: ResourceLimits,
    ) -> Result<ContainerPlacement, DeployError> {
        let image = self.build(agent_id, bundle).await?;
        self.start(agent_id, &image, limits).await
    }

    /// Build the agent image and return its tag.
    pub async fn build(&self, agent_id: &AgentId, bundle: &BuildBundle) -> Result<String, DeployError> {
        let image = self.image_name(agent_id);
        let context = BuildContext::materialize(&self.settings.workspace_dir, agent_id, bundle).await?;

        let result = self.build_from_context(&image, &context).await;
        context.remove().await;

        match result {
            Ok(()) => {
                info!(agent_id = %agent_id, "Built image {}", image);
                Ok(image)
            }
            Err(e) => {
                error!(agent_id = %agent_id, "Image build failed: {}", e);
                self.remove_image_best_effort(&image).await;
                Err(e)
            }
        }
    }

    async fn build_from_context(&self, image: &str, context: &BuildContext) -> Result<(), DeployError> {
        let archive = context.archive().await?;
        debug!("Build context for {} is {} bytes", image, archive.len());

        match tokio::time::timeout(self.settings.build_timeout, self.runtime.build_image(image, archive)).await {
            Ok(Ok(_output)) => Ok(()),
            Ok(Err(RuntimeError::BuildFailed { message, log })) => Err(DeployError::BuildFailed { reason: message, log }),
            Ok(Err(e)) => Err(DeployError::Runtime(e)),
            Err(_) => Err(DeployError::BuildFailed {
                reason: format!("build timed out after {}s", self.settings.build_timeout.as_secs()),
                log: String::new(),
            }),
        }
    }

    /// Create and start the agent container, then wait for its host port.
    /// On failure the container and the image are removed.
    pub async fn start(
        &self,
        agent_id: &AgentId,
        image: &str,
        limits: ResourceLimits,
    ) -> Result<ContainerPlacement, DeployError> {
        let name = self.container_name(agent_id);
        let spec = ContainerSpec {
            name: name.clone(),
            image: image.to_string(),
            internal_port: self.settings.internal_port,
            limits,
            labels: HashMap::from([(AGENT_LABEL.to_string(), agent_id.to_string())]),
            network_mode: self.settings.network_mode.clone(),
        };

        let mut created: Option<ContainerId> = None;
        let outcome = tokio::time::timeout(self.settings.start_timeout, self.launch(&spec, &mut created)).await;

        let (failure, timed_out) = match outcome {
            Ok(Ok(placement)) => {
                info!(
                    agent_id = %agent_id,
                    container = %placement.container_id,
                    "Agent serving at {}",
                    placement.service_url
                );
                return Ok(placement);
            }
            Ok(Err(e)) => (e, false),
            Err(_) => (
                DeployError::StartFailed {
                    reason: format!("start timed out after {}s", self.settings.start_timeout.as_secs()),
                    log: String::new(),
                },
                true,
            ),
        };

        error!(agent_id = %agent_id, "Container start failed: {}", failure);
        // An interrupted create may have completed without us seeing its id
        let container = match created {
            Some(id) => Some(id),
            None if timed_out => Some(ContainerId::new(name)),
            None => None,
        };

        let failure = match &container {
            Some(container) => {
                let failure = self.attach_logs(failure, container).await;
                if let Err(e) = self.runtime.stop_and_remove(container, 0).await {
                    warn!(agent_id = %agent_id, "Failed to remove container {} after start failure: {}", container, e);
                }
                failure
            }
            None => failure,
        };
        self.remove_image_best_effort(image).await;
        Err(failure)
    }

    async fn launch(&self, spec: &ContainerSpec, created: &mut Option<ContainerId>) -> Result<ContainerPlacement, DeployError> {
        let id = self.runtime.create_container(spec).await.map_err(start_failure)?;
        *created = Some(id.clone());

        self.runtime.start_container(&id).await.map_err(start_failure)?;

        loop {
            let state = self.runtime.inspect_container(&id).await.map_err(start_failure)?;
            if state.status.is_gone() {
                let reason = match (state.oom_killed, state.exit_code) {
                    (true, _) => "container was OOM-killed before exposing its port".to_string(),
                    (false, Some(code)) => format!("container exited with code {} before exposing its port", code),
                    (false, None) => "container exited before exposing its port".to_string(),
                };
                return Err(DeployError::StartFailed {
                    reason,
                    log: String::new(),
                });
            }
            if let Some(host_port) = state.host_port {
                return Ok(ContainerPlacement {
                    container_id: id,
                    host_port,
                    service_url: self.service_url(host_port),
                });
            }
            tokio::time::sleep(self.settings.port_poll_interval).await;
        }
    }

    async fn attach_logs(&self, failure: DeployError, container: &ContainerId) -> DeployError {
        match failure {
            DeployError::StartFailed { reason, log } if log.is_empty() => {
                let log = self
                    .runtime
                    .container_logs(container, START_LOG_TAIL)
                    .await
                    .unwrap_or_default();
                DeployError::StartFailed { reason, log }
            }
            other => other,
        }
    }

    pub async fn inspect(&self, container: &ContainerId) -> Result<ContainerState, RuntimeError> {
        self.runtime.inspect_container(container).await
    }

    /// Stop and remove a container, then remove its image. Only the
    /// container teardown can fail the call.
    pub async fn teardown(&self, container: &ContainerId, image: &str) -> Result<(), RuntimeError> {
        self.runtime
            .stop_and_remove(container, self.settings.stop_grace_secs)
            .await?;
        self.remove_image_best_effort(image).await;
        Ok(())
    }

    async fn remove_image_best_effort(&self, image: &str) {
        if let Err(e) = self.runtime.remove_image(image).await {
            warn!("Failed to remove image {}: {}", image, e);
        }
    }
}

fn start_failure(e: RuntimeError) -> DeployError {
    match e {
        RuntimeError::Unavailable(_) => DeployError::Runtime(e),
        other => DeployError::StartFailed {
            reason: other.to_string(),
            log: String::new(),
        },
    }
}
