// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer
//!
//! HTTP surface that translates external requests into calls on the
//! [`AgentLifecycleService`](crate::application::agent::AgentLifecycleService).
//! No business logic lives here.
//!
//! | Route | Description |
//! |-------|-------------|
//! | `GET /health` | liveness |
//! | `POST /api/v1/agents` | deploy an agent |
//! | `GET /api/v1/agents` | list running agents |
//! | `GET /api/v1/agents/{id}` | live status of one agent |
//! | `POST /api/v1/agents/{id}/stop` | stop and remove an agent |
//! | `POST /api/v1/agents/{id}/predict` | proxy a prediction request |

pub mod api;
