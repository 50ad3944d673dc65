// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Prediction envelope shared by every deployed agent.
//!
//! ```json
//! { "data": [result], "status": "success", "duration": 0.012 }
//! { "error": { "message": "...", "code": "PROCESSING_ERROR" }, "status": "error", "duration": 0.001 }
//! ```

use serde::{Deserialize, Serialize};

/// Error code the generated wrapper reports when `predict` raises.
pub const PROCESSING_ERROR: &str = "PROCESSING_ERROR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub message: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<serde_json::Value>>,
    pub status: EnvelopeStatus,
    /// Wall-clock seconds spent in the agent's `predict`
    #[serde(default)]
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,
}

impl PredictionEnvelope {
    pub fn success(result: serde_json::Value, duration: f64) -> Self {
        Self {
            data: Some(vec![result]),
            status: EnvelopeStatus::Success,
            duration,
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>, code: impl Into<String>, duration: f64) -> Self {
        Self {
            data: None,
            status: EnvelopeStatus::Error,
            duration,
            error: Some(EnvelopeError {
                message: message.into(),
                code: code.into(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == EnvelopeStatus::Success
    }
}
