// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Agents, deployments and the container runtime seam. No I/O lives here.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Types and invariants shared by every other layer

pub mod agent;
pub mod deployment;
pub mod envelope;
pub mod events;
pub mod node_config;
pub mod runtime;
