// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

mod common;

use common::{test_config, FakeRuntime, SENTIMENT_AGENT};
use minions_orchestrator_core::application::orchestrator::{
    DeployError, DeploymentOrchestrator, OrchestratorSettings, AGENT_LABEL,
};
use minions_orchestrator_core::domain::agent::{AgentId, AgentMetadata};
use minions_orchestrator_core::domain::deployment::ResourceLimits;
use minions_orchestrator_core::domain::runtime::ContainerRuntime;
use minions_orchestrator_core::infrastructure::wrapper_synthesizer::WrapperSynthesizer;
use std::sync::Arc;
use std::time::Duration;

fn orchestrator(runtime: Arc<FakeRuntime>, workspace: &std::path::Path) -> DeploymentOrchestrator {
    let mut settings = OrchestratorSettings::from_config(&test_config(workspace));
    settings.port_poll_interval = Duration::from_millis(5);
    settings.build_timeout = Duration::from_millis(200);
    DeploymentOrchestrator::new(runtime as Arc<dyn ContainerRuntime>, settings)
}

fn limits() -> ResourceLimits {
    ResourceLimits {
        memory_mb: 256,
        cpu_cores: 0.5,
    }
}

fn bundle(name: &str) -> (AgentId, minions_orchestrator_core::infrastructure::wrapper_synthesizer::BuildBundle) {
    let metadata = AgentMetadata::new(name, "orchestrator test", "demo");
    let bundle = WrapperSynthesizer::new("python:3.9-slim", 7860)
        .bundle(SENTIMENT_AGENT, &metadata)
        .unwrap();
    (metadata.agent_id(), bundle)
}

#[tokio::test]
async fn test_deploy_names_and_limits() {
    let workspace = tempfile::tempdir().unwrap();
    let runtime = Arc::new(FakeRuntime::new());
    let orchestrator = orchestrator(runtime.clone(), workspace.path());
    let (agent_id, bundle) = bundle("Word Counter");

    let placement = orchestrator.deploy(&agent_id, &bundle, limits()).await.unwrap();

    assert_eq!(placement.service_url, format!("http://127.0.0.1:{}", placement.host_port));
    assert!(runtime.has_image("smart-minions/agent-word_counter:latest"));

    let container = runtime.container_named("minion-word_counter").unwrap();
    assert_eq!(container.spec.limits.memory_bytes(), 256 * 1024 * 1024);
    assert_eq!(container.spec.limits.nano_cpus(), 500_000_000);
    assert_eq!(container.spec.labels.get(AGENT_LABEL).map(String::as_str), Some("word_counter"));
    assert!(!workspace.path().join("word_counter").exists());
}

#[tokio::test]
async fn test_port_is_polled_until_bound() {
    let workspace = tempfile::tempdir().unwrap();
    let runtime = Arc::new(FakeRuntime::new());
    runtime.delay_port_binding(3);
    let orchestrator = orchestrator(runtime.clone(), workspace.path());
    let (agent_id, bundle) = bundle("Slow Binder");

    let placement = orchestrator.deploy(&agent_id, &bundle, limits()).await.unwrap();
    assert!(placement.host_port > 0);
}

#[tokio::test]
async fn test_build_timeout_is_a_build_failure() {
    let workspace = tempfile::tempdir().unwrap();
    let runtime = Arc::new(FakeRuntime::new().with_build_delay(Duration::from_secs(2)));
    let orchestrator = orchestrator(runtime.clone(), workspace.path());
    let (agent_id, bundle) = bundle("Glacial");

    let err = orchestrator.deploy(&agent_id, &bundle, limits()).await.unwrap_err();

    match err {
        DeployError::BuildFailed { reason, .. } => assert!(reason.contains("timed out")),
        other => panic!("expected build failure, got {:?}", other),
    }
    assert!(!workspace.path().join("glacial").exists());
    assert_eq!(runtime.container_count(), 0);
}

#[tokio::test]
async fn test_name_collision_is_torn_down_without_touching_the_other_container() {
    let workspace = tempfile::tempdir().unwrap();
    let runtime = Arc::new(FakeRuntime::new());
    let orchestrator = orchestrator(runtime.clone(), workspace.path());
    let (agent_id, bundle) = bundle("Echo");

    let placement = orchestrator.deploy(&agent_id, &bundle, limits()).await.unwrap();
    let err = orchestrator.start(&agent_id, "smart-minions/agent-echo:latest", limits()).await.unwrap_err();

    match err {
        DeployError::StartFailed { reason, .. } => assert!(reason.contains("already in use")),
        other => panic!("expected start failure, got {:?}", other),
    }
    let survivor = runtime.container_named("minion-echo").unwrap();
    assert_eq!(survivor.host_port, Some(placement.host_port));
}

#[tokio::test]
async fn test_runtime_outage_is_reported_as_runtime_error() {
    let workspace = tempfile::tempdir().unwrap();
    let runtime = Arc::new(FakeRuntime::new());
    runtime.set_unavailable(true);
    let orchestrator = orchestrator(runtime.clone(), workspace.path());
    let (agent_id, bundle) = bundle("Echo");

    let err = orchestrator.deploy(&agent_id, &bundle, limits()).await.unwrap_err();
    assert!(matches!(err, DeployError::Runtime(_)));
    assert!(!workspace.path().join("echo").exists());
}
