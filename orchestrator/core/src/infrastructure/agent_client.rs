// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent Prediction Client
//!
//! Forwards prediction requests to a deployed agent's gradio service.
//!
//! # Wire Format
//!
//! ```text
//! POST {service_url}/api/predict   {"data": ["input", ...]}
//! 200                              {"data": [<envelope>], "is_generating": false, ...}
//! ```
//!
//! The wrapper registers a single text input, so gradio only ever hands the
//! first element of `data` to the agent. Additional inputs are accepted and
//! silently ignored.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::domain::envelope::PredictionEnvelope;

/// Path of the gradio prediction endpoint, relative to the service URL
pub const PREDICT_PATH: &str = "/api/predict";

const ERROR_BODY_LIMIT: usize = 512;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Agent service unreachable: {0}")]
    Request(String),

    #[error("Agent service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Agent service returned an unexpected response: {0}")]
    InvalidResponse(String),
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    data: &'a [String],
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Clone)]
pub struct AgentClient {
    client: Client,
}

impl AgentClient {
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Request(e.to_string()))?;
        Ok(Self { client })
    }

    pub async fn predict(&self, service_url: &str, inputs: &[String]) -> Result<PredictionEnvelope, ClientError> {
        let url = format!("{}{}", service_url.trim_end_matches('/'), PREDICT_PATH);
        debug!("Forwarding {} input(s) to {}", inputs.len(), url);

        let response = self
            .client
            .post(&url)
            .json(&PredictRequest { data: inputs })
            .send()
            .await
            .map_err(|e| ClientError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > ERROR_BODY_LIMIT {
                let mut cut = ERROR_BODY_LIMIT;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: PredictResponse = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        unwrap_envelope(payload.data)
    }
}

/// The envelope is the single output of the wrapper's interface. Depending
/// on the gradio version a JSON output arrives either as an object or as a
/// JSON-encoded string.
fn unwrap_envelope(data: Vec<serde_json::Value>) -> Result<PredictionEnvelope, ClientError> {
    let first = data
        .into_iter()
        .next()
        .ok_or_else(|| ClientError::InvalidResponse("empty data array".to_string()))?;

    let value = match first {
        serde_json::Value::String(encoded) => {
            serde_json::from_str(&encoded).map_err(|e| ClientError::InvalidResponse(e.to_string()))?
        }
        other => other,
    };

    serde_json::from_value(value).map_err(|e| ClientError::InvalidResponse(format!("not an envelope: {}", e)))
}
