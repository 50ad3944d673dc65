// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod agent_client;
pub mod build_context;
pub mod event_bus;
pub mod runtime;
pub mod source_validator;
pub mod wrapper_synthesizer;

pub use runtime::DockerRuntime;
