// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::application::agent::{AgentLifecycleService, DeployRequest, LifecycleError};
use crate::domain::agent::AgentId;
use crate::infrastructure::agent_client::PREDICT_PATH;

pub struct AppState {
    pub lifecycle: Arc<dyn AgentLifecycleService>,
}

pub fn app(lifecycle: Arc<dyn AgentLifecycleService>) -> Router {
    let state = Arc::new(AppState { lifecycle });

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/agents", post(deploy_agent).get(list_agents))
        .route("/api/v1/agents/{id}", get(agent_status))
        .route("/api/v1/agents/{id}/stop", post(stop_agent))
        .route("/api/v1/agents/{id}/predict", post(predict))
        .with_state(state)
}

/// `{"error": {"message", "code"}, "status": "error"}` with a status code
/// derived from the error kind.
pub struct ApiError(pub LifecycleError);

impl From<LifecycleError> for ApiError {
    fn from(e: LifecycleError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            e if e.is_validation() => StatusCode::BAD_REQUEST,
            LifecycleError::Conflict(_) => StatusCode::CONFLICT,
            LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
            LifecycleError::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut error = json!({
            "message": self.0.to_string(),
            "code": self.0.code(),
        });
        if let LifecycleError::Build { log, .. } | LifecycleError::Start { log, .. } = &self.0 {
            if !log.is_empty() {
                error["log"] = json!(log);
            }
        }

        (status, Json(json!({ "error": error, "status": "error" }))).into_response()
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

async fn deploy_agent(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DeployRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.lifecycle.deploy(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "agent_id": outcome.agent_id,
            "service_url": outcome.service_url,
            "api_endpoint": outcome.api_endpoint,
            "deployment_status": outcome.status,
            "warnings": outcome.warnings,
        })),
    ))
}

async fn list_agents(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let agents: Vec<_> = state
        .lifecycle
        .list()
        .await
        .into_iter()
        .map(|record| {
            let service_url = record.service_url.unwrap_or_default();
            json!({
                "id": record.agent_id,
                "metadata": record.metadata,
                "api_endpoint": format!("{}{}", service_url, PREDICT_PATH),
                "service_url": service_url,
            })
        })
        .collect();

    Json(json!({ "status": "success", "agents": agents }))
}

async fn agent_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let agent_id = AgentId::new(id);
    match state.lifecycle.status(&agent_id).await? {
        Some(record) => Ok(Json(record)),
        None => Err(ApiError(LifecycleError::NotFound(agent_id))),
    }
}

async fn stop_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let stopped = state.lifecycle.stop(&AgentId::new(id)).await?;
    Ok(Json(json!({ "status": "success", "stopped": stopped })))
}

#[derive(Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

async fn predict(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<PredictRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // The agent receives text; non-string inputs are passed as their JSON form
    let inputs = request
        .data
        .into_iter()
        .map(|value| match value {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .collect();

    let envelope = state.lifecycle.predict(&AgentId::new(id), inputs).await?;
    Ok(Json(envelope))
}
