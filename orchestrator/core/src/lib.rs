// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Minions Orchestrator Core
//!
//! Deploys third-party gradio agents as isolated, resource-bounded
//! containers and tracks them for their whole lifetime.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Domain:** agents, deployment records and their state machine, the
//!   container runtime seam, configuration
//! - **Infrastructure:** source validation, wrapper synthesis, build
//!   contexts, Docker, the prediction proxy, the event bus
//! - **Application:** the lifecycle registry, the build & run orchestrator
//!   and the [`AgentLifecycleService`](application::AgentLifecycleService)
//! - **Presentation:** the axum HTTP API

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
