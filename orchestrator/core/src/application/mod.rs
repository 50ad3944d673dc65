// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod agent;
pub mod lifecycle;
pub mod orchestrator;
pub mod registry;

// Re-export use cases for convenience
pub use agent::{AgentLifecycleService, CleanupReport, DeployOutcome, DeployRequest, LifecycleError};
pub use lifecycle::StandardAgentLifecycleService;
