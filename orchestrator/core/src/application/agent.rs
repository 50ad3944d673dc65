// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::agent::{AgentId, AgentMetadata, MetadataError};
use crate::domain::deployment::{DeploymentRecord, DeploymentStatus};
use crate::domain::envelope::PredictionEnvelope;
use crate::infrastructure::event_bus::EventReceiver;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRequest {
    pub source: String,
    pub metadata: AgentMetadata,
    /// Displace a running deployment with the same identifier
    #[serde(default)]
    pub replace: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployOutcome {
    pub agent_id: AgentId,
    pub service_url: String,
    pub api_endpoint: String,
    pub status: DeploymentStatus,
    /// Non-fatal problems found in the submitted source.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupFailure {
    pub agent_id: AgentId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupReport {
    pub stopped: Vec<AgentId>,
    pub failed: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Invalid agent code: {0}")]
    InvalidSource(String),

    #[error("Invalid agent metadata: {0}")]
    InvalidMetadata(#[from] MetadataError),

    #[error("{0}")]
    Conflict(String),

    #[error("Failed to generate agent wrapper: {0}")]
    Synthesis(String),

    #[error("Image build failed: {reason}")]
    Build { reason: String, log: String },

    #[error("Agent failed to start: {reason}")]
    Start { reason: String, log: String },

    #[error("Agent '{0}' not found")]
    NotFound(AgentId),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Container runtime error: {0}")]
    Runtime(String),

    #[error("Prediction failed: {0}")]
    Upstream(String),
}

impl LifecycleError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSource(_) => "INVALID_CODE",
            Self::InvalidMetadata(_) => "INVALID_METADATA",
            Self::Conflict(_) => "AGENT_CONFLICT",
            Self::Synthesis(_) => "WRAP_ERROR",
            Self::Build { .. } => "BUILD_ERROR",
            Self::Start { .. } => "START_ERROR",
            Self::NotFound(_) => "AGENT_NOT_FOUND",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Runtime(_) => "RUNTIME_ERROR",
            Self::Upstream(_) => "PREDICTION_ERROR",
        }
    }

    /// Raised before anything was reserved or spawned
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidSource(_) | Self::InvalidMetadata(_) | Self::InvalidInput(_))
    }
}

/// Control surface over agent deployments.
#[async_trait]
pub trait AgentLifecycleService: Send + Sync {
    /// Validate, wrap, build and start an agent.
    async fn deploy(&self, request: DeployRequest) -> Result<DeployOutcome, LifecycleError>;

    /// Running deployments, sorted by identifier.
    async fn list(&self) -> Vec<DeploymentRecord>;

    /// The record refreshed against the live container; `None` if unknown.
    async fn status(&self, agent_id: &AgentId) -> Result<Option<DeploymentRecord>, LifecycleError>;

    /// `false` when there was nothing to stop. Never fails for unknown ids.
    ///
    /// A stopped record is evicted right away, so a later `status` for the
    /// same id returns `None` rather than a `Stopped` record. If the teardown
    /// fails the record goes back to `Running` and stays tracked.
    async fn stop(&self, agent_id: &AgentId) -> Result<bool, LifecycleError>;

    /// Stop every placed agent; failures are collected, never abort the sweep.
    async fn cleanup(&self) -> CleanupReport;

    /// Forward inputs to the agent's service and return its envelope.
    async fn predict(&self, agent_id: &AgentId, inputs: Vec<String>) -> Result<PredictionEnvelope, LifecycleError>;

    fn events(&self) -> EventReceiver;
}
