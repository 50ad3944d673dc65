// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::application::agent::{
    AgentLifecycleService, CleanupFailure, CleanupReport, DeployOutcome, DeployRequest, LifecycleError,
};
use crate::application::orchestrator::{DeployError, DeploymentOrchestrator, OrchestratorSettings};
use crate::application::registry::{DeploymentRegistry, RegistryError};
use crate::domain::agent::AgentId;
use crate::domain::deployment::{DeploymentRecord, DeploymentStatus, ResourceLimits};
use crate::domain::envelope::PredictionEnvelope;
use crate::domain::events::DeploymentEvent;
use crate::domain::node_config::NodeConfig;
use crate::domain::runtime::{ContainerRuntime, RuntimeError};
use crate::infrastructure::agent_client::{AgentClient, ClientError, PREDICT_PATH};
use crate::infrastructure::event_bus::{EventBus, EventReceiver};
use crate::infrastructure::source_validator::{SourceValidator, ENTRY_POINT};
use crate::infrastructure::wrapper_synthesizer::WrapperSynthesizer;

pub struct StandardAgentLifecycleService {
    core: Arc<LifecycleCore>,
    validator: SourceValidator,
    client: AgentClient,
}

/// State shared with the detached deploy tasks.
struct LifecycleCore {
    registry: DeploymentRegistry,
    orchestrator: DeploymentOrchestrator,
    synthesizer: WrapperSynthesizer,
    limits: ResourceLimits,
    event_bus: EventBus,
}

impl StandardAgentLifecycleService {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: &NodeConfig) -> Result<Self, ClientError> {
        Ok(Self {
            core: Arc::new(LifecycleCore {
                registry: DeploymentRegistry::new(),
                orchestrator: DeploymentOrchestrator::new(runtime, OrchestratorSettings::from_config(config)),
                synthesizer: WrapperSynthesizer::new(config.runtime.base_image.clone(), config.runtime.internal_port),
                limits: config.limits.to_limits(),
                event_bus: EventBus::with_default_capacity(),
            }),
            validator: SourceValidator::new(),
            client: AgentClient::new(config.timeouts.predict())?,
        })
    }

    pub fn registry(&self) -> &DeploymentRegistry {
        &self.core.registry
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.core.event_bus
    }
}

impl LifecycleCore {
    /// Drive a reserved deployment to `Running`, releasing the reservation on
    /// failure. Runs on its own task so a caller that stops waiting cannot
    /// strand the reservation or a half-started container.
    async fn run_deploy(
        self: Arc<Self>,
        agent_id: AgentId,
        request: DeployRequest,
        displaced: Option<DeploymentRecord>,
    ) -> Result<DeployOutcome, LifecycleError> {
        match self.deploy_reserved(&agent_id, &request, displaced).await {
            Ok(outcome) => {
                info!(agent_id = %agent_id, "Agent running at {}", outcome.service_url);
                Ok(outcome)
            }
            Err(e) => {
                error!(agent_id = %agent_id, code = e.code(), "Deployment failed: {}", e);
                self.registry.release(&agent_id);
                Err(e)
            }
        }
    }

    /// Everything after the reservation. Any error leaves the reservation in
    /// place for the caller to release.
    async fn deploy_reserved(
        &self,
        agent_id: &AgentId,
        request: &DeployRequest,
        displaced: Option<DeploymentRecord>,
    ) -> Result<DeployOutcome, LifecycleError> {
        self.advance(agent_id, DeploymentStatus::Validating)?;
        self.advance(agent_id, DeploymentStatus::Validated)?;

        if let Some(previous) = displaced {
            if let Err(e) = self.retire_displaced(&previous).await {
                // The old container may still be serving: keep tracking it
                if !self.registry.restore(previous) {
                    warn!(agent_id = %agent_id, "Could not restore the deployment that failed to be replaced");
                }
                return Err(e);
            }
        }

        self.advance(agent_id, DeploymentStatus::Wrapping)?;
        let bundle = match self.synthesizer.bundle(&request.source, &request.metadata) {
            Ok(bundle) => bundle,
            Err(e) => {
                self.advance(agent_id, DeploymentStatus::WrapFailed)?;
                return Err(LifecycleError::Synthesis(e.to_string()));
            }
        };
        self.advance(agent_id, DeploymentStatus::Wrapped)?;

        self.advance(agent_id, DeploymentStatus::Building)?;
        let image = match self.orchestrator.build(agent_id, &bundle).await {
            Ok(image) => image,
            Err(e) => {
                self.advance(agent_id, DeploymentStatus::BuildFailed)?;
                self.event_bus.publish(DeploymentEvent::BuildFailed {
                    agent_id: agent_id.clone(),
                    reason: e.to_string(),
                    failed_at: Utc::now(),
                });
                return Err(deploy_failure(e));
            }
        };
        self.advance(agent_id, DeploymentStatus::Built)?;
        self.event_bus.publish(DeploymentEvent::ImageBuilt {
            agent_id: agent_id.clone(),
            image_name: image.clone(),
            built_at: Utc::now(),
        });

        self.advance(agent_id, DeploymentStatus::Starting)?;
        let placement = match self.orchestrator.start(agent_id, &image, self.limits).await {
            Ok(placement) => placement,
            Err(e) => {
                self.advance(agent_id, DeploymentStatus::StartFailed)?;
                self.event_bus.publish(DeploymentEvent::StartFailed {
                    agent_id: agent_id.clone(),
                    reason: e.to_string(),
                    failed_at: Utc::now(),
                });
                return Err(deploy_failure(e));
            }
        };

        let container_id = placement.container_id.clone();
        let record = match self.registry.mark_running(agent_id, placement) {
            Ok(record) => record,
            Err(e) => {
                // Only reachable if the reservation vanished under us
                if let Err(teardown) = self.orchestrator.teardown(&container_id, &image).await {
                    warn!(agent_id = %agent_id, "Failed to remove orphaned container {}: {}", container_id, teardown);
                }
                return Err(registry_failure(e));
            }
        };

        let service_url = record.service_url.clone().unwrap_or_default();
        self.event_bus.publish(DeploymentEvent::Started {
            agent_id: agent_id.clone(),
            container_id,
            service_url: service_url.clone(),
            started_at: Utc::now(),
        });

        Ok(DeployOutcome {
            agent_id: agent_id.clone(),
            api_endpoint: format!("{}{}", service_url, PREDICT_PATH),
            service_url,
            status: record.status,
            warnings: Vec::new(),
        })
    }

    fn advance(&self, agent_id: &AgentId, next: DeploymentStatus) -> Result<DeploymentRecord, LifecycleError> {
        self.registry.transition(agent_id, next).map_err(registry_failure)
    }

    /// Tear down the container of a record displaced by a replacing deploy.
    async fn retire_displaced(&self, previous: &DeploymentRecord) -> Result<(), LifecycleError> {
        let Some(container) = &previous.container_handle else {
            return Ok(());
        };

        info!(agent_id = %previous.agent_id, "Replacing running deployment (container {})", container);
        self.orchestrator
            .teardown(container, &previous.image_name)
            .await
            .map_err(|e| LifecycleError::Runtime(format!("failed to remove replaced deployment: {}", e)))?;

        self.event_bus.publish(DeploymentEvent::Stopped {
            agent_id: previous.agent_id.clone(),
            stopped_at: Utc::now(),
        });
        Ok(())
    }

    /// A placed record whose container is gone: mark it failed, clean up what
    /// is left of it and evict it. The failed record is returned one last time.
    async fn record_crash(
        &self,
        record: DeploymentRecord,
        exit_code: Option<i64>,
        oom_killed: bool,
    ) -> Result<Option<DeploymentRecord>, LifecycleError> {
        let agent_id = record.agent_id.clone();
        let Some(container) = record.container_handle.clone() else {
            return Ok(Some(record));
        };

        let failed = match self.registry.transition(&agent_id, DeploymentStatus::Failed) {
            Ok(failed) => failed,
            // Someone else already moved it on (stop, replace)
            Err(_) => return Ok(self.registry.get(&agent_id)),
        };

        warn!(
            agent_id = %agent_id,
            exit_code = ?exit_code,
            oom_killed,
            "Agent container is no longer running"
        );
        self.event_bus.publish(DeploymentEvent::Crashed {
            agent_id: agent_id.clone(),
            exit_code,
            oom_killed,
            detected_at: Utc::now(),
        });

        if let Err(e) = self.orchestrator.teardown(&container, &record.image_name).await {
            warn!(agent_id = %agent_id, "Failed to clean up crashed container {}: {}", container, e);
        }
        self.registry.evict(&agent_id, &container);
        Ok(Some(failed))
    }
}

fn registry_failure(e: RegistryError) -> LifecycleError {
    match e {
        RegistryError::AlreadyDeployed(agent_id) => LifecycleError::Conflict(format!(
            "Agent '{}' is already deployed; stop it first or deploy with replace",
            agent_id
        )),
        RegistryError::Busy { agent_id, status } => {
            LifecycleError::Conflict(format!("Agent '{}' is busy ({})", agent_id, status))
        }
        RegistryError::NotFound(agent_id) => LifecycleError::Conflict(format!(
            "Deployment of '{}' was cancelled concurrently",
            agent_id
        )),
        e @ RegistryError::InvalidTransition { .. } => LifecycleError::Conflict(e.to_string()),
    }
}

fn deploy_failure(e: DeployError) -> LifecycleError {
    match e {
        DeployError::BuildFailed { reason, log } => LifecycleError::Build { reason, log },
        DeployError::StartFailed { reason, log } => LifecycleError::Start { reason, log },
        DeployError::Context(e) => LifecycleError::Build {
            reason: format!("failed to prepare build context: {}", e),
            log: String::new(),
        },
        DeployError::Runtime(e) => LifecycleError::Runtime(e.to_string()),
    }
}

#[async_trait]
impl AgentLifecycleService for StandardAgentLifecycleService {
    async fn deploy(&self, request: DeployRequest) -> Result<DeployOutcome, LifecycleError> {
        // Everything that can be rejected without side effects goes first
        request.metadata.validate()?;
        let verdict = self.validator.inspect(&request.source);
        if !verdict.valid {
            let reason = verdict.reason.unwrap_or_else(|| "structural check failed".to_string());
            info!(agent = %request.metadata.name, "Rejected agent source: {}", reason);
            return Err(LifecycleError::InvalidSource(reason));
        }

        let mut warnings = Vec::new();
        if !verdict.defines_entry_point {
            let warning = format!("No '{}' function is defined; every prediction will fail", ENTRY_POINT);
            warn!(agent = %request.metadata.name, "{}", warning);
            warnings.push(warning);
        }

        let core = &self.core;
        let agent_id = request.metadata.agent_id();
        let image_name = core.orchestrator.image_name(&agent_id);
        let displaced = core
            .registry
            .reserve(agent_id.clone(), request.metadata.clone(), image_name, request.replace)
            .map_err(registry_failure)?;

        info!(agent_id = %agent_id, replace = request.replace, "Deploying agent");
        core.event_bus.publish(DeploymentEvent::Reserved {
            agent_id: agent_id.clone(),
            replaced: displaced.is_some(),
            reserved_at: Utc::now(),
        });

        let task = tokio::spawn(core.clone().run_deploy(agent_id.clone(), request, displaced));
        match task.await {
            Ok(result) => result.map(|outcome| DeployOutcome { warnings, ..outcome }),
            Err(e) => {
                error!(agent_id = %agent_id, "Deploy task aborted: {}", e);
                core.registry.release(&agent_id);
                Err(LifecycleError::Runtime(format!("deploy task aborted: {}", e)))
            }
        }
    }

    async fn list(&self) -> Vec<DeploymentRecord> {
        self.core.registry.running()
    }

    async fn status(&self, agent_id: &AgentId) -> Result<Option<DeploymentRecord>, LifecycleError> {
        let Some(record) = self.core.registry.get(agent_id) else {
            return Ok(None);
        };
        let Some(container) = record.container_handle.clone() else {
            return Ok(Some(record));
        };
        if record.status != DeploymentStatus::Running {
            return Ok(Some(record));
        }

        match self.core.orchestrator.inspect(&container).await {
            Ok(state) if state.status.is_gone() => self.core.record_crash(record, state.exit_code, state.oom_killed).await,
            Ok(_) => Ok(Some(record)),
            Err(RuntimeError::InstanceNotFound(_)) => self.core.record_crash(record, None, false).await,
            Err(e) => {
                warn!(agent_id = %agent_id, "Could not refresh agent status: {}", e);
                Ok(Some(record))
            }
        }
    }

    async fn stop(&self, agent_id: &AgentId) -> Result<bool, LifecycleError> {
        let Some(record) = self.core.registry.get(agent_id) else {
            return Ok(false);
        };
        let Some(container) = record.container_handle.clone() else {
            return Ok(false);
        };
        if self.core.registry.transition(agent_id, DeploymentStatus::Stopping).is_err() {
            // Already stopping, stopped or failed
            return Ok(false);
        }

        if let Err(e) = self.core.orchestrator.teardown(&container, &record.image_name).await {
            error!(agent_id = %agent_id, "Failed to stop agent: {}", e);
            if let Err(restore) = self.core.registry.transition(agent_id, DeploymentStatus::Running) {
                warn!(agent_id = %agent_id, "Could not restore record after failed stop: {}", restore);
            }
            return Err(LifecycleError::Runtime(e.to_string()));
        }

        if let Err(e) = self.core.registry.transition(agent_id, DeploymentStatus::Stopped) {
            warn!(agent_id = %agent_id, "Unexpected state after stop: {}", e);
        }
        self.core.registry.evict(agent_id, &container);
        self.core.event_bus.publish(DeploymentEvent::Stopped {
            agent_id: agent_id.clone(),
            stopped_at: Utc::now(),
        });

        info!(agent_id = %agent_id, "Stopped agent");
        Ok(true)
    }

    async fn cleanup(&self) -> CleanupReport {
        let mut report = CleanupReport::default();
        let placed: Vec<_> = self
            .core
            .registry
            .snapshot()
            .into_iter()
            .filter(|record| record.container_handle.is_some())
            .collect();

        info!("Cleaning up {} agent deployment(s)", placed.len());
        for record in placed {
            match self.stop(&record.agent_id).await {
                Ok(true) => report.stopped.push(record.agent_id),
                Ok(false) => {}
                Err(e) => {
                    error!(agent_id = %record.agent_id, "Cleanup failed: {}", e);
                    report.failed.push(CleanupFailure {
                        agent_id: record.agent_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if report.is_clean() {
            info!("Cleanup complete: {} agent(s) stopped", report.stopped.len());
        } else {
            warn!(
                "Cleanup finished with {} failure(s); {} agent(s) stopped",
                report.failed.len(),
                report.stopped.len()
            );
        }
        report
    }

    async fn predict(&self, agent_id: &AgentId, inputs: Vec<String>) -> Result<PredictionEnvelope, LifecycleError> {
        if inputs.is_empty() {
            return Err(LifecycleError::InvalidInput("at least one input is required".to_string()));
        }

        let record = self
            .core
            .registry
            .get(agent_id)
            .ok_or_else(|| LifecycleError::NotFound(agent_id.clone()))?;
        let service_url = match (&record.service_url, record.status) {
            (Some(url), DeploymentStatus::Running) => url.clone(),
            (_, status) => {
                return Err(LifecycleError::Conflict(format!(
                    "Agent '{}' is not running ({})",
                    agent_id, status
                )))
            }
        };

        self.client
            .predict(&service_url, &inputs)
            .await
            .map_err(|e| LifecycleError::Upstream(e.to_string()))
    }

    fn events(&self) -> EventReceiver {
        self.core.event_bus.subscribe()
    }
}
