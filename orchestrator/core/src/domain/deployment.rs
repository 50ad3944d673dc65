// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Deployment Aggregate
//!
//! A [`DeploymentRecord`] is the registry's unit of truth for one agent: its
//! metadata, image, container placement and lifecycle status.
//!
//! # State Machine
//!
//! ```text
//! Submitted → Validating → (Validated | Rejected)
//! Validated → Wrapping   → (Wrapped   | WrapFailed)
//! Wrapped   → Building   → (Built     | BuildFailed)
//! Built     → Starting   → (Running   | StartFailed)
//! Running   → Stopping   → Stopped
//! Running   → Failed                       (crash observed by a status query)
//! ```
//!
//! `Rejected`, `WrapFailed`, `BuildFailed` and `StartFailed` never reach the
//! registry: they are reported to the caller of `deploy` and leave no residue.

use crate::domain::agent::{AgentId, AgentMetadata};
use crate::domain::runtime::ContainerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Submitted,
    Validating,
    Validated,
    Rejected,
    Wrapping,
    Wrapped,
    WrapFailed,
    Building,
    Built,
    BuildFailed,
    Starting,
    Running,
    StartFailed,
    Stopping,
    Stopped,
    Failed,
}

impl DeploymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Rejected
                | Self::WrapFailed
                | Self::BuildFailed
                | Self::StartFailed
                | Self::Stopped
                | Self::Failed
        )
    }

    /// Only `Running` deployments are reported as live.
    pub fn is_live(self) -> bool {
        self == Self::Running
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        use DeploymentStatus::*;
        matches!(
            (self, next),
            (Submitted, Validating)
                | (Validating, Validated)
                | (Validating, Rejected)
                | (Validated, Wrapping)
                | (Wrapping, Wrapped)
                | (Wrapping, WrapFailed)
                | (Wrapped, Building)
                | (Building, Built)
                | (Building, BuildFailed)
                | (Built, Starting)
                | (Starting, Running)
                | (Starting, StartFailed)
                | (Running, Stopping)
                | (Running, Failed)
                | (Stopping, Stopped)
                // a stop the runtime refused leaves the container serving
                | (Stopping, Running)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Validating => "validating",
            Self::Validated => "validated",
            Self::Rejected => "rejected",
            Self::Wrapping => "wrapping",
            Self::Wrapped => "wrapped",
            Self::WrapFailed => "wrap_failed",
            Self::Building => "building",
            Self::Built => "built",
            Self::BuildFailed => "build_failed",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::StartFailed => "start_failed",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a successfully started agent lives. Produced by the orchestrator,
/// stored by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerPlacement {
    pub container_id: ContainerId,
    pub host_port: u16,
    pub service_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub agent_id: AgentId,
    pub metadata: AgentMetadata,
    pub image_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_handle: Option<ContainerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
    pub status: DeploymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeploymentRecord {
    /// A freshly reserved record: the identifier is claimed, nothing is built yet.
    pub fn reserved(agent_id: AgentId, metadata: AgentMetadata, image_name: String) -> Self {
        let now = Utc::now();
        Self {
            agent_id,
            metadata,
            image_name,
            container_handle: None,
            host_port: None,
            status: DeploymentStatus::Submitted,
            service_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a state machine edge; returns `false` (and leaves the record
    /// untouched) when the edge does not exist.
    pub fn transition(&mut self, next: DeploymentStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.updated_at = Utc::now();
        true
    }

    pub fn place(&mut self, placement: ContainerPlacement) -> bool {
        if !self.transition(DeploymentStatus::Running) {
            return false;
        }
        self.container_handle = Some(placement.container_id);
        self.host_port = Some(placement.host_port);
        self.service_url = Some(placement.service_url);
        true
    }
}

/// Resource ceiling applied to every agent container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub memory_mb: u64,
    pub cpu_cores: f64,
}

impl ResourceLimits {
    pub fn memory_bytes(&self) -> i64 {
        (self.memory_mb as i64).saturating_mul(1024 * 1024)
    }

    /// Docker nano_cpus: 1 CPU = 1e9 nano CPUs
    pub fn nano_cpus(&self) -> i64 {
        (self.cpu_cores * 1_000_000_000.0).round() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DeploymentRecord {
        let metadata = AgentMetadata::new("Echo", "echoes", "demo");
        DeploymentRecord::reserved(metadata.agent_id(), metadata, "smart-minions/agent-echo:latest".into())
    }

    #[test]
    fn test_happy_path_reaches_running() {
        let mut record = record();
        for next in [
            DeploymentStatus::Validating,
            DeploymentStatus::Validated,
            DeploymentStatus::Wrapping,
            DeploymentStatus::Wrapped,
            DeploymentStatus::Building,
            DeploymentStatus::Built,
            DeploymentStatus::Starting,
        ] {
            assert!(record.transition(next), "edge to {next} rejected");
        }

        assert!(record.place(ContainerPlacement {
            container_id: ContainerId::new("abc"),
            host_port: 49153,
            service_url: "http://localhost:49153".into(),
        }));
        assert_eq!(record.status, DeploymentStatus::Running);
        assert_eq!(record.host_port, Some(49153));
        assert!(record.status.is_live());
    }

    #[test]
    fn test_illegal_edges_are_refused() {
        let mut record = record();
        assert!(!record.transition(DeploymentStatus::Running));
        assert!(!record.transition(DeploymentStatus::Stopped));
        assert_eq!(record.status, DeploymentStatus::Submitted);

        assert!(!DeploymentStatus::Stopped.can_transition_to(DeploymentStatus::Running));
        assert!(!DeploymentStatus::Failed.can_transition_to(DeploymentStatus::Running));
        assert!(DeploymentStatus::Stopping.can_transition_to(DeploymentStatus::Running));
    }

    #[test]
    fn test_terminal_states() {
        assert!(DeploymentStatus::BuildFailed.is_terminal());
        assert!(DeploymentStatus::Stopped.is_terminal());
        assert!(!DeploymentStatus::Building.is_terminal());
        assert!(!DeploymentStatus::Running.is_terminal());
    }

    #[test]
    fn test_resource_limit_conversion() {
        let limits = ResourceLimits { memory_mb: 512, cpu_cores: 0.5 };
        assert_eq!(limits.memory_bytes(), 512 * 1024 * 1024);
        assert_eq!(limits.nano_cpus(), 500_000_000);
    }
}
