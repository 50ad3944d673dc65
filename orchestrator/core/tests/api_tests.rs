// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{test_config, FakeRuntime, NO_INTERFACE_AGENT, NO_PREDICT_AGENT, SENTIMENT_AGENT};
use minions_orchestrator_core::application::agent::AgentLifecycleService;
use minions_orchestrator_core::application::lifecycle::StandardAgentLifecycleService;
use minions_orchestrator_core::domain::runtime::ContainerRuntime;
use minions_orchestrator_core::presentation::api::app;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn router() -> (Router, TempDir) {
    let workspace = tempfile::tempdir().unwrap();
    let runtime = Arc::new(FakeRuntime::new()) as Arc<dyn ContainerRuntime>;
    let service = StandardAgentLifecycleService::new(runtime, &test_config(workspace.path())).unwrap();
    (app(Arc::new(service) as Arc<dyn AgentLifecycleService>), workspace)
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn deploy_body(name: &str, source: &str) -> Value {
    json!({
        "source": source,
        "metadata": {
            "name": name,
            "description": "Classifies text sentiment",
            "model_type": "nlp",
        }
    })
}

#[tokio::test]
async fn test_health() {
    let (router, _workspace) = router();
    let (status, body) = send(&router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_deploy_list_status_stop_flow() {
    let (router, _workspace) = router();

    let (status, body) = send(&router, "POST", "/api/v1/agents", Some(deploy_body("Sentiment Bot", SENTIMENT_AGENT))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "success");
    assert_eq!(body["agent_id"], "sentiment_bot");
    assert_eq!(body["deployment_status"], "running");
    let service_url = body["service_url"].as_str().unwrap().to_string();
    assert_eq!(body["api_endpoint"], format!("{}/api/predict", service_url));

    let (status, body) = send(&router, "GET", "/api/v1/agents", None).await;
    assert_eq!(status, StatusCode::OK);
    let agents = body["agents"].as_array().unwrap();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0]["id"], "sentiment_bot");
    assert_eq!(agents[0]["metadata"]["name"], "Sentiment Bot");
    assert_eq!(agents[0]["service_url"], service_url);

    let (status, body) = send(&router, "GET", "/api/v1/agents/sentiment_bot", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");

    let (status, body) = send(&router, "POST", "/api/v1/agents/sentiment_bot/stop", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stopped"], true);

    let (status, body) = send(&router, "POST", "/api/v1/agents/sentiment_bot/stop", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stopped"], false);

    let (status, body) = send(&router, "GET", "/api/v1/agents/sentiment_bot", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "AGENT_NOT_FOUND");
}

#[tokio::test]
async fn test_invalid_code_is_a_bad_request() {
    let (router, _workspace) = router();

    let (status, body) = send(&router, "POST", "/api/v1/agents", Some(deploy_body("Plain", NO_INTERFACE_AGENT))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"]["code"], "INVALID_CODE");
    assert!(body["error"]["message"].as_str().unwrap().contains("Interface"));
}

#[tokio::test]
async fn test_deploy_reports_source_warnings() {
    let (router, _workspace) = router();

    let (status, body) = send(&router, "POST", "/api/v1/agents", Some(deploy_body("Shouter", NO_PREDICT_AGENT))).await;

    assert_eq!(status, StatusCode::CREATED);
    let warnings = body["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].as_str().unwrap().contains("predict"));
}

#[tokio::test]
async fn test_duplicate_deploy_is_a_conflict() {
    let (router, _workspace) = router();
    let body = deploy_body("Echo", SENTIMENT_AGENT);

    let (status, _) = send(&router, "POST", "/api/v1/agents", Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, response) = send(&router, "POST", "/api/v1/agents", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(response["error"]["code"], "AGENT_CONFLICT");
}

#[tokio::test]
async fn test_predict_requires_input() {
    let (router, _workspace) = router();

    let (status, body) = send(&router, "POST", "/api/v1/agents/echo/predict", Some(json!({"data": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");

    let (status, body) = send(&router, "POST", "/api/v1/agents/echo/predict", Some(json!({"data": ["hi"]}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "AGENT_NOT_FOUND");
}
