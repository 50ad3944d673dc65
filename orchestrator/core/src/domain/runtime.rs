// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::deployment::ResourceLimits;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(pub String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything needed to create one agent container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// Port the wrapped service listens on inside the container; published
    /// to an ephemeral host port chosen by the OS.
    pub internal_port: u16,
    pub limits: ResourceLimits,
    pub labels: HashMap<String, String>,
    pub network_mode: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown,
}

impl ContainerStatus {
    /// The container will not serve requests again without intervention.
    pub fn is_gone(self) -> bool {
        matches!(self, Self::Exited | Self::Dead | Self::Removing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerState {
    pub status: ContainerStatus,
    pub exit_code: Option<i64>,
    pub oom_killed: bool,
    /// Host side of the published service port, once the runtime has bound it
    pub host_port: Option<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildOutput {
    pub log: String,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Container runtime unavailable: {0}")]
    Unavailable(String),

    #[error("Image build failed: {message}")]
    BuildFailed { message: String, log: String },

    #[error("Failed to create container: {0}")]
    SpawnFailed(String),

    #[error("Failed to start container: {0}")]
    StartFailed(String),

    #[error("Failed to inspect container: {0}")]
    InspectFailed(String),

    #[error("Failed to terminate container: {0}")]
    TerminationFailed(String),

    #[error("Failed to remove image: {0}")]
    ImageRemovalFailed(String),

    #[error("Container not found: {0}")]
    InstanceNotFound(String),
}

/// The container engine seam. Implemented by Docker in production and by
/// in-memory fakes in tests.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Build an image from a tar-packed build context.
    async fn build_image(&self, tag: &str, context: Vec<u8>) -> Result<BuildOutput, RuntimeError>;

    /// Remove an image. A missing image is not an error.
    async fn remove_image(&self, tag: &str) -> Result<(), RuntimeError>;

    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId, RuntimeError>;

    async fn start_container(&self, id: &ContainerId) -> Result<(), RuntimeError>;

    /// Live state; `InstanceNotFound` when the container no longer exists.
    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerState, RuntimeError>;

    /// Last `tail` lines of combined stdout/stderr.
    async fn container_logs(&self, id: &ContainerId, tail: usize) -> Result<String, RuntimeError>;

    /// Stop then remove. Idempotent: an already stopped or already removed
    /// container succeeds.
    async fn stop_and_remove(&self, id: &ContainerId, grace_secs: u32) -> Result<(), RuntimeError>;
}
