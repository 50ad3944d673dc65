// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::agent::AgentId;
use crate::domain::runtime::ContainerId;

/// Lifecycle milestones of a single agent deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeploymentEvent {
    Reserved {
        agent_id: AgentId,
        replaced: bool,
        reserved_at: DateTime<Utc>,
    },
    ImageBuilt {
        agent_id: AgentId,
        image_name: String,
        built_at: DateTime<Utc>,
    },
    BuildFailed {
        agent_id: AgentId,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    Started {
        agent_id: AgentId,
        container_id: ContainerId,
        service_url: String,
        started_at: DateTime<Utc>,
    },
    StartFailed {
        agent_id: AgentId,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    Stopped {
        agent_id: AgentId,
        stopped_at: DateTime<Utc>,
    },
    /// The container died outside the manager's control (crash, OOM kill)
    Crashed {
        agent_id: AgentId,
        exit_code: Option<i64>,
        oom_killed: bool,
        detected_at: DateTime<Utc>,
    },
}

impl DeploymentEvent {
    pub fn agent_id(&self) -> &AgentId {
        match self {
            Self::Reserved { agent_id, .. }
            | Self::ImageBuilt { agent_id, .. }
            | Self::BuildFailed { agent_id, .. }
            | Self::Started { agent_id, .. }
            | Self::StartFailed { agent_id, .. }
            | Self::Stopped { agent_id, .. }
            | Self::Crashed { agent_id, .. } => agent_id,
        }
    }
}
