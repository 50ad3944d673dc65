// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP client for communicating with daemon API

use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use minions_orchestrator_core::application::agent::DeployRequest;
use minions_orchestrator_core::domain::agent::AgentMetadata;
use minions_orchestrator_core::domain::deployment::DeploymentRecord;
use minions_orchestrator_core::domain::envelope::PredictionEnvelope;

use super::base_url;

#[derive(Debug, Clone, Deserialize)]
pub struct DeployResponse {
    pub agent_id: String,
    pub service_url: String,
    pub api_endpoint: String,
    pub deployment_status: String,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentSummary {
    pub id: String,
    pub metadata: AgentMetadata,
    pub api_endpoint: String,
    pub service_url: String,
}

#[derive(Debug, Clone)]
pub struct DaemonClient {
    client: Client,
    base_url: String,
}

impl DaemonClient {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        Self::with_base_url(base_url(host, port))
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        // No global timeout: a deploy waits for the image build
        let client = Client::builder().build().context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub async fn deploy_agent(&self, request: &DeployRequest) -> Result<DeployResponse> {
        let response = self
            .client
            .post(format!("{}/api/v1/agents", self.base_url))
            .json(request)
            .send()
            .await
            .context("Failed to deploy agent")?;

        let response = ensure_success(response, "Failed to deploy agent").await?;
        response.json().await.context("Failed to parse deploy response")
    }

    pub async fn list_agents(&self) -> Result<Vec<AgentSummary>> {
        let response = self
            .client
            .get(format!("{}/api/v1/agents", self.base_url))
            .send()
            .await
            .context("Failed to list agents")?;

        #[derive(Deserialize)]
        struct ListResponse {
            agents: Vec<AgentSummary>,
        }

        let response = ensure_success(response, "Failed to list agents").await?;
        let list: ListResponse = response.json().await.context("Failed to parse agent list")?;
        Ok(list.agents)
    }

    /// `None` when the daemon does not know the agent.
    pub async fn agent_status(&self, agent_id: &str) -> Result<Option<DeploymentRecord>> {
        let response = self
            .client
            .get(format!("{}/api/v1/agents/{}", self.base_url, agent_id))
            .send()
            .await
            .context("Failed to get agent status")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = ensure_success(response, "Failed to get agent status").await?;
        response.json().await.map(Some).context("Failed to parse agent status")
    }

    pub async fn stop_agent(&self, agent_id: &str) -> Result<bool> {
        let response = self
            .client
            .post(format!("{}/api/v1/agents/{}/stop", self.base_url, agent_id))
            .send()
            .await
            .context("Failed to stop agent")?;

        #[derive(Deserialize)]
        struct StopResponse {
            stopped: bool,
        }

        let response = ensure_success(response, "Failed to stop agent").await?;
        let stop: StopResponse = response.json().await.context("Failed to parse stop response")?;
        Ok(stop.stopped)
    }

    pub async fn predict(&self, agent_id: &str, inputs: Vec<String>) -> Result<PredictionEnvelope> {
        #[derive(Serialize)]
        struct PredictRequest {
            data: Vec<String>,
        }

        let response = self
            .client
            .post(format!("{}/api/v1/agents/{}/predict", self.base_url, agent_id))
            .json(&PredictRequest { data: inputs })
            .send()
            .await
            .context("Failed to call agent")?;

        let response = ensure_success(response, "Prediction failed").await?;
        response.json().await.context("Failed to parse prediction envelope")
    }
}

/// Turns an error response into `"<context>: <message> (<code>)"`.
async fn ensure_success(response: Response, context: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            let message = v["error"]["message"].as_str()?.to_string();
            let code = v["error"]["code"].as_str().unwrap_or("UNKNOWN").to_string();
            Some(match v["error"]["log"].as_str() {
                Some(log) => format!("{} ({})\n{}", message, code, log),
                None => format!("{} ({})", message, code),
            })
        })
        .unwrap_or_else(|| format!("HTTP {}: {}", status, body));

    anyhow::bail!("{}: {}", context, detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn metadata() -> AgentMetadata {
        AgentMetadata::new("Echo", "Repeats its input", "demo")
    }

    #[tokio::test]
    async fn test_deploy_posts_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/agents")
            .match_body(Matcher::PartialJson(json!({"metadata": {"name": "Echo"}, "replace": false})))
            .with_status(201)
            .with_body(
                json!({
                    "status": "success",
                    "agent_id": "echo",
                    "service_url": "http://127.0.0.1:49001",
                    "api_endpoint": "http://127.0.0.1:49001/api/predict",
                    "deployment_status": "running",
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = DaemonClient::with_base_url(server.url()).unwrap();
        let request = DeployRequest {
            source: "import gradio as gr".to_string(),
            metadata: metadata(),
            replace: false,
        };
        let response = client.deploy_agent(&request).await.unwrap();

        assert_eq!(response.agent_id, "echo");
        assert_eq!(response.deployment_status, "running");
        assert!(response.warnings.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_body_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/agents")
            .with_status(500)
            .with_body(
                json!({
                    "status": "error",
                    "error": {"message": "Image build failed", "code": "BUILD_ERROR", "log": "Step 4/8"},
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = DaemonClient::with_base_url(server.url()).unwrap();
        let request = DeployRequest {
            source: String::new(),
            metadata: metadata(),
            replace: false,
        };
        let err = client.deploy_agent(&request).await.unwrap_err().to_string();

        assert!(err.contains("BUILD_ERROR"));
        assert!(err.contains("Step 4/8"));
    }

    #[tokio::test]
    async fn test_unknown_agent_status_is_none() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/agents/ghost")
            .with_status(404)
            .with_body(json!({"status": "error", "error": {"message": "not found", "code": "AGENT_NOT_FOUND"}}).to_string())
            .create_async()
            .await;

        let client = DaemonClient::with_base_url(server.url()).unwrap();
        assert!(client.agent_status("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_and_stop() {
        let mut server = mockito::Server::new_async().await;
        let _list = server
            .mock("GET", "/api/v1/agents")
            .with_body(
                json!({
                    "status": "success",
                    "agents": [{
                        "id": "echo",
                        "metadata": {"name": "Echo", "description": "d", "model_type": "demo"},
                        "api_endpoint": "http://127.0.0.1:49001/api/predict",
                        "service_url": "http://127.0.0.1:49001",
                    }],
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _stop = server
            .mock("POST", "/api/v1/agents/echo/stop")
            .with_body(json!({"status": "success", "stopped": true}).to_string())
            .create_async()
            .await;

        let client = DaemonClient::with_base_url(server.url()).unwrap();
        let agents = client.list_agents().await.unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].metadata.name, "Echo");
        assert!(client.stop_agent("echo").await.unwrap());
    }

    #[tokio::test]
    async fn test_predict_returns_envelope() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/agents/echo/predict")
            .match_body(Matcher::Json(json!({"data": ["hello"]})))
            .with_body(json!({"data": ["HELLO"], "status": "success", "duration": 0.01}).to_string())
            .create_async()
            .await;

        let client = DaemonClient::with_base_url(server.url()).unwrap();
        let envelope = client.predict("echo", vec!["hello".to_string()]).await.unwrap();

        assert!(envelope.is_success());
        assert_eq!(envelope.data, Some(vec![json!("HELLO")]));
    }
}
