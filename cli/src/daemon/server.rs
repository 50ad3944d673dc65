// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP daemon hosting the agent lifecycle API

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{debug, error, info, warn};

use minions_orchestrator_core::{
    application::{
        agent::{AgentLifecycleService, CleanupReport},
        lifecycle::StandardAgentLifecycleService,
    },
    domain::{events::DeploymentEvent, node_config::NodeConfig, runtime::ContainerRuntime},
    infrastructure::{event_bus::EventBusError, DockerRuntime},
    presentation::api,
};

pub async fn start_daemon(config_path: Option<PathBuf>, host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = NodeConfig::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    let runtime = DockerRuntime::new(config.runtime.docker_socket_path.clone(), config.timeouts.build())
        .context("Failed to initialize Docker runtime")?;
    runtime
        .healthcheck()
        .await
        .context("Docker daemon is not reachable")?;
    info!("Connected to Docker daemon");

    let lifecycle = Arc::new(
        StandardAgentLifecycleService::new(Arc::new(runtime) as Arc<dyn ContainerRuntime>, &config)
            .context("Failed to initialize lifecycle service")?,
    );

    tokio::spawn(log_events(lifecycle.clone()));

    let app = api::app(lifecycle.clone() as Arc<dyn AgentLifecycleService>);

    let host = host.unwrap_or_else(|| config.network.bind_address.clone());
    let port = port.unwrap_or(config.network.port);
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Daemon listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Daemon shutting down, stopping deployed agents");
    report_cleanup(&lifecycle.cleanup().await);

    Ok(())
}

async fn log_events(lifecycle: Arc<StandardAgentLifecycleService>) {
    let mut events = lifecycle.events();
    loop {
        match events.recv().await {
            Ok(event) => log_event(&event),
            Err(EventBusError::Lagged(n)) => warn!("Dropped {} deployment events", n),
            Err(_) => break,
        }
    }
}

fn log_event(event: &DeploymentEvent) {
    match event {
        DeploymentEvent::Started { agent_id, service_url, .. } => {
            info!(agent_id = %agent_id, service_url = %service_url, "Agent started")
        }
        DeploymentEvent::BuildFailed { agent_id, reason, .. }
        | DeploymentEvent::StartFailed { agent_id, reason, .. } => {
            warn!(agent_id = %agent_id, reason = %reason, "Agent deployment failed")
        }
        DeploymentEvent::Crashed {
            agent_id,
            exit_code,
            oom_killed,
            ..
        } => warn!(agent_id = %agent_id, exit_code = ?exit_code, oom_killed, "Agent container crashed"),
        other => debug!(agent_id = %other.agent_id(), event = ?other, "Deployment event"),
    }
}

fn report_cleanup(report: &CleanupReport) {
    info!("Stopped {} agents", report.stopped.len());
    for failure in &report.failed {
        error!(agent_id = %failure.agent_id, "Failed to stop agent: {}", failure.reason);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
