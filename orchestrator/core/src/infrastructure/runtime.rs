// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::runtime::{
    BuildOutput, ContainerId, ContainerRuntime, ContainerSpec, ContainerState, ContainerStatus, RuntimeError,
};
use async_trait::async_trait;
use bollard::errors::Error as BollardError;
use bollard::models::{ContainerCreateBody, ContainerStateStatusEnum, HostConfig, PortBinding};
use bollard::query_parameters::{
    BuildImageOptionsBuilder, CreateContainerOptionsBuilder, InspectContainerOptions, LogsOptionsBuilder,
    RemoveContainerOptionsBuilder, RemoveImageOptionsBuilder, StartContainerOptions, StopContainerOptionsBuilder,
};
use bollard::Docker;
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lines of build output kept for error reports.
const BUILD_LOG_TAIL: usize = 40;

pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the Docker daemon. `request_timeout` bounds every API call,
    /// so it must cover the longest image build.
    pub fn new(socket_path: Option<String>, request_timeout: Duration) -> Result<Self, RuntimeError> {
        let timeout_secs = request_timeout.as_secs().max(1);
        let docker = if let Some(path) = socket_path {
            #[cfg(unix)]
            let result = Docker::connect_with_unix(&path, timeout_secs, bollard::API_DEFAULT_VERSION);

            #[cfg(windows)]
            let result = Docker::connect_with_named_pipe(&path, timeout_secs, bollard::API_DEFAULT_VERSION);

            result.map_err(|e| {
                RuntimeError::Unavailable(format!(
                    "Failed to connect to Docker at {}: {}\n\n\
                     Ensure Docker is running and the socket path is correct.",
                    path, e
                ))
            })?
        } else {
            Docker::connect_with_local_defaults()
                .map_err(|e| {
                    RuntimeError::Unavailable(format!(
                        "Failed to connect to Docker: {}\n\n\
                         Common causes:\n\
                         - Docker daemon not running (check: docker ps)\n\
                         - Permission denied accessing Docker socket\n\
                         - On Linux: Current user not in 'docker' group",
                        e
                    ))
                })?
                .with_timeout(Duration::from_secs(timeout_secs))
        };

        Ok(Self { docker })
    }

    /// Verify the Docker daemon is accessible
    pub async fn healthcheck(&self) -> Result<(), RuntimeError> {
        self.docker.ping().await.map_err(|e| {
            RuntimeError::Unavailable(format!(
                "Cannot connect to Docker daemon: {}\n\n\
                 Docker healthcheck failed. Ensure Docker is running.\n\
                 Verify with: docker ps",
                e
            ))
        })?;
        Ok(())
    }
}

fn server_status(error: &BollardError) -> Option<u16> {
    match error {
        BollardError::DockerResponseServerError { status_code, .. } => Some(*status_code),
        _ => None,
    }
}

fn is_not_found(error: &BollardError) -> bool {
    server_status(error) == Some(404)
}

/// Anything that is not an answer from the daemon means it could not be reached.
fn is_transport(error: &BollardError) -> bool {
    server_status(error).is_none()
}

fn map_status(status: Option<ContainerStateStatusEnum>) -> ContainerStatus {
    match status {
        Some(ContainerStateStatusEnum::CREATED) => ContainerStatus::Created,
        Some(ContainerStateStatusEnum::RUNNING) => ContainerStatus::Running,
        Some(ContainerStateStatusEnum::PAUSED) => ContainerStatus::Paused,
        Some(ContainerStateStatusEnum::RESTARTING) => ContainerStatus::Restarting,
        Some(ContainerStateStatusEnum::REMOVING) => ContainerStatus::Removing,
        Some(ContainerStateStatusEnum::EXITED) => ContainerStatus::Exited,
        Some(ContainerStateStatusEnum::DEAD) => ContainerStatus::Dead,
        _ => ContainerStatus::Unknown,
    }
}

fn tail_lines(lines: &[String], n: usize) -> String {
    let start = lines.len().saturating_sub(n);
    lines[start..].concat()
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn build_image(&self, tag: &str, context: Vec<u8>) -> Result<BuildOutput, RuntimeError> {
        let options = BuildImageOptionsBuilder::new()
            .dockerfile("Dockerfile")
            .t(tag)
            .rm(true)
            .forcerm(true)
            .build();

        info!("Building image {}", tag);
        let mut stream = self
            .docker
            .build_image(options, None, Some(bollard::body_full(context.into())));

        let mut log = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(info) => {
                    if let Some(line) = info.stream {
                        debug!(image = tag, "{}", line.trim_end());
                        log.push(line);
                    }
                    if let Some(message) = info.error_detail.and_then(|detail| detail.message) {
                        return Err(RuntimeError::BuildFailed {
                            message,
                            log: tail_lines(&log, BUILD_LOG_TAIL),
                        });
                    }
                }
                Err(e) if is_transport(&e) && !matches!(e, BollardError::DockerStreamError { .. }) => {
                    return Err(RuntimeError::Unavailable(e.to_string()));
                }
                Err(e) => {
                    return Err(RuntimeError::BuildFailed {
                        message: e.to_string(),
                        log: tail_lines(&log, BUILD_LOG_TAIL),
                    });
                }
            }
        }

        info!("Built image {}", tag);
        Ok(BuildOutput { log: log.concat() })
    }

    async fn remove_image(&self, tag: &str) -> Result<(), RuntimeError> {
        let options = RemoveImageOptionsBuilder::new().force(true).build();
        match self.docker.remove_image(tag, Some(options), None).await {
            Ok(_) => {
                debug!("Removed image {}", tag);
                Ok(())
            }
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(RuntimeError::ImageRemovalFailed(format!("{}: {}", tag, e))),
        }
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId, RuntimeError> {
        let port_key = format!("{}/tcp", spec.internal_port);
        // Empty host port lets the daemon pick a free ephemeral port
        let port_bindings = HashMap::from([(
            port_key,
            Some(vec![PortBinding {
                host_ip: None,
                host_port: Some(String::new()),
            }]),
        )]);

        let body = ContainerCreateBody {
            image: Some(spec.image.clone()),
            labels: Some(spec.labels.clone()),
            host_config: Some(HostConfig {
                memory: Some(spec.limits.memory_bytes()),
                nano_cpus: Some(spec.limits.nano_cpus()),
                port_bindings: Some(port_bindings),
                network_mode: spec.network_mode.clone(),
                ..HostConfig::default()
            }),
            ..ContainerCreateBody::default()
        };

        let options = CreateContainerOptionsBuilder::new().name(&spec.name).build();
        let response = self
            .docker
            .create_container(Some(options), body)
            .await
            .map_err(|e| match e {
                e if is_transport(&e) => RuntimeError::Unavailable(e.to_string()),
                e => RuntimeError::SpawnFailed(format!("{}: {}", spec.name, e)),
            })?;

        for warning in &response.warnings {
            warn!(container = %spec.name, "Docker warning: {}", warning);
        }

        info!("Created container {} ({})", spec.name, response.id);
        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), RuntimeError> {
        self.docker
            .start_container(id.as_str(), None::<StartContainerOptions>)
            .await
            .map_err(|e| match e {
                e if is_not_found(&e) => RuntimeError::InstanceNotFound(id.to_string()),
                e if is_transport(&e) => RuntimeError::Unavailable(e.to_string()),
                e => RuntimeError::StartFailed(e.to_string()),
            })
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerState, RuntimeError> {
        let inspect = self
            .docker
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(|e| match e {
                e if is_not_found(&e) => RuntimeError::InstanceNotFound(id.to_string()),
                e if is_transport(&e) => RuntimeError::Unavailable(e.to_string()),
                e => RuntimeError::InspectFailed(e.to_string()),
            })?;

        let state = inspect.state.unwrap_or_default();
        let host_port = inspect
            .network_settings
            .and_then(|settings| settings.ports)
            .and_then(|ports| {
                ports
                    .into_values()
                    .flatten()
                    .flatten()
                    .find_map(|binding| binding.host_port.and_then(|port| port.parse::<u16>().ok()))
            })
            .filter(|port| *port != 0);

        Ok(ContainerState {
            status: map_status(state.status),
            exit_code: state.exit_code,
            oom_killed: state.oom_killed.unwrap_or(false),
            host_port,
        })
    }

    async fn container_logs(&self, id: &ContainerId, tail: usize) -> Result<String, RuntimeError> {
        let tail = tail.to_string();
        let options = LogsOptionsBuilder::new()
            .stdout(true)
            .stderr(true)
            .tail(&tail)
            .build();

        let mut stream = self.docker.logs(id.as_str(), Some(options));
        let mut out = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(output) => out.push_str(&String::from_utf8_lossy(&output.into_bytes())),
                Err(e) if is_not_found(&e) => return Err(RuntimeError::InstanceNotFound(id.to_string())),
                Err(e) => return Err(RuntimeError::InspectFailed(format!("logs: {}", e))),
            }
        }
        Ok(out)
    }

    async fn stop_and_remove(&self, id: &ContainerId, grace_secs: u32) -> Result<(), RuntimeError> {
        let grace = i32::try_from(grace_secs).unwrap_or(i32::MAX);
        let stop = StopContainerOptionsBuilder::new().t(grace).build();
        match self.docker.stop_container(id.as_str(), Some(stop)).await {
            Ok(()) => debug!("Stopped container {}", id),
            // 304: already stopped, 404: already gone
            Err(e) if matches!(server_status(&e), Some(304) | Some(404)) => {}
            Err(e) if is_transport(&e) => return Err(RuntimeError::Unavailable(e.to_string())),
            Err(e) => return Err(RuntimeError::TerminationFailed(format!("stop {}: {}", id, e))),
        }

        let remove = RemoveContainerOptionsBuilder::new().force(true).v(true).build();
        match self.docker.remove_container(id.as_str(), Some(remove)).await {
            Ok(()) => {}
            Err(e) if is_not_found(&e) => {}
            // 409: removal already in progress
            Err(e) if server_status(&e) == Some(409) => {}
            Err(e) if is_transport(&e) => return Err(RuntimeError::Unavailable(e.to_string())),
            Err(e) => return Err(RuntimeError::TerminationFailed(format!("remove {}: {}", id, e))),
        }

        info!("Terminated agent container: {}", id);
        Ok(())
    }
}
