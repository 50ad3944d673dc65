// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lifecycle Registry
//!
//! Concurrency-safe map from [`AgentId`] to [`DeploymentRecord`]. Every
//! operation is a short critical section on one shard of a [`DashMap`]; no
//! lock is ever held across an await point, so builds and container starts
//! never block other agents.
//!
//! # Reservation
//!
//! [`DeploymentRegistry::reserve`] claims an identifier through the map's
//! entry API before anything is built. Of two concurrent deploys with the
//! same identifier exactly one obtains the reservation.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use crate::domain::agent::{AgentId, AgentMetadata};
use crate::domain::deployment::{ContainerPlacement, DeploymentRecord, DeploymentStatus};
use crate::domain::runtime::ContainerId;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Agent '{0}' is already deployed")]
    AlreadyDeployed(AgentId),

    #[error("Agent '{agent_id}' is busy ({status})")]
    Busy { agent_id: AgentId, status: DeploymentStatus },

    #[error("Agent '{0}' not found")]
    NotFound(AgentId),

    #[error("Agent '{agent_id}' cannot move from {from} to {to}")]
    InvalidTransition {
        agent_id: AgentId,
        from: DeploymentStatus,
        to: DeploymentStatus,
    },
}

#[derive(Default)]
pub struct DeploymentRegistry {
    records: DashMap<AgentId, DeploymentRecord>,
}

impl DeploymentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `agent_id` with a fresh `Submitted` record.
    ///
    /// A terminal leftover is overwritten. A `Running` record is displaced
    /// only when `replace` is set, and is handed back so the caller can tear
    /// it down. Any deployment still in flight is a conflict.
    pub fn reserve(
        &self,
        agent_id: AgentId,
        metadata: AgentMetadata,
        image_name: String,
        replace: bool,
    ) -> Result<Option<DeploymentRecord>, RegistryError> {
        let record = DeploymentRecord::reserved(agent_id.clone(), metadata, image_name);

        match self.records.entry(agent_id) {
            Entry::Vacant(entry) => {
                debug!(agent_id = %entry.key(), "Reserved agent id");
                entry.insert(record);
                Ok(None)
            }
            Entry::Occupied(mut entry) => {
                let status = entry.get().status;
                if status.is_terminal() || (status.is_live() && replace) {
                    debug!(agent_id = %entry.key(), previous = %status, "Reserved agent id over existing record");
                    Ok(Some(entry.insert(record)))
                } else if status.is_live() {
                    Err(RegistryError::AlreadyDeployed(entry.key().clone()))
                } else {
                    Err(RegistryError::Busy {
                        agent_id: entry.key().clone(),
                        status,
                    })
                }
            }
        }
    }

    /// Move a record along a state machine edge and return the updated copy.
    pub fn transition(&self, agent_id: &AgentId, next: DeploymentStatus) -> Result<DeploymentRecord, RegistryError> {
        let mut record = self
            .records
            .get_mut(agent_id)
            .ok_or_else(|| RegistryError::NotFound(agent_id.clone()))?;

        let from = record.status;
        if !record.transition(next) {
            return Err(RegistryError::InvalidTransition {
                agent_id: agent_id.clone(),
                from,
                to: next,
            });
        }
        Ok(record.clone())
    }

    /// Store the placement and mark the record `Running`.
    pub fn mark_running(
        &self,
        agent_id: &AgentId,
        placement: ContainerPlacement,
    ) -> Result<DeploymentRecord, RegistryError> {
        let mut record = self
            .records
            .get_mut(agent_id)
            .ok_or_else(|| RegistryError::NotFound(agent_id.clone()))?;

        let from = record.status;
        if !record.place(placement) {
            return Err(RegistryError::InvalidTransition {
                agent_id: agent_id.clone(),
                from,
                to: DeploymentStatus::Running,
            });
        }
        Ok(record.clone())
    }

    pub fn get(&self, agent_id: &AgentId) -> Option<DeploymentRecord> {
        self.records.get(agent_id).map(|record| record.clone())
    }

    /// Put back a record displaced by a replacing deploy whose teardown
    /// failed. Only an unplaced reservation (or nothing) is overwritten;
    /// returns whether the record was restored.
    pub fn restore(&self, previous: DeploymentRecord) -> bool {
        match self.records.entry(previous.agent_id.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(previous);
                true
            }
            Entry::Occupied(mut entry) if entry.get().container_handle.is_none() => {
                debug!(agent_id = %entry.key(), status = %previous.status, "Restored displaced record");
                entry.insert(previous);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Remove the record only while it still refers to `container`. A newer
    /// reservation under the same identifier is left alone.
    pub fn evict(&self, agent_id: &AgentId, container: &ContainerId) -> Option<DeploymentRecord> {
        self.records
            .remove_if(agent_id, |_, record| record.container_handle.as_ref() == Some(container))
            .map(|(_, record)| record)
    }

    /// Drop an in-flight reservation after a failed deploy. Placed records
    /// are never released.
    pub fn release(&self, agent_id: &AgentId) -> Option<DeploymentRecord> {
        self.records
            .remove_if(agent_id, |_, record| record.container_handle.is_none())
            .map(|(_, record)| record)
    }

    /// `Running` records sorted by identifier.
    pub fn running(&self) -> Vec<DeploymentRecord> {
        let mut records: Vec<_> = self
            .records
            .iter()
            .filter(|record| record.status.is_live())
            .map(|record| record.clone())
            .collect();
        records.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        records
    }

    /// Every record, whatever its status, sorted by identifier.
    pub fn snapshot(&self) -> Vec<DeploymentRecord> {
        let mut records: Vec<_> = self.records.iter().map(|record| record.clone()).collect();
        records.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
