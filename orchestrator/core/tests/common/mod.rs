// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory container runtime shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use minions_orchestrator_core::domain::node_config::NodeConfig;
use minions_orchestrator_core::domain::runtime::{
    BuildOutput, ContainerId, ContainerRuntime, ContainerSpec, ContainerState, ContainerStatus, RuntimeError,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

pub const SENTIMENT_AGENT: &str = r#"
import gradio as gr

def predict(text):
    return "POSITIVE" if "good" in text else "NEGATIVE"

demo = gr.Interface(fn=predict, inputs="text", outputs="text")

if __name__ == "__main__":
    demo.launch()
"#;

pub const NO_INTERFACE_AGENT: &str = "import gradio as gr\n\ndef predict(text):\n    return text\n";

/// Structurally valid, but the wrapper's `predict` call has nothing to call
pub const NO_PREDICT_AGENT: &str = r#"
import gradio as gr

def classify(text):
    return text.upper()

demo = gr.Interface(fn=classify, inputs="text", outputs="text")
"#;

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub name: String,
    pub image: String,
    pub spec: ContainerSpec,
    pub status: ContainerStatus,
    pub host_port: Option<u16>,
    pub exit_code: Option<i64>,
}

#[derive(Default)]
struct FakeState {
    images: HashSet<String>,
    containers: HashMap<ContainerId, FakeContainer>,
    next_id: u32,
    next_port: u16,
    build_failures: HashSet<String>,
    exiting_images: HashSet<String>,
    stop_failures: HashSet<String>,
    unavailable: bool,
    builds: u32,
    /// Inspections that report no bound port yet
    unbound_polls: u32,
}

pub struct FakeRuntime {
    state: Mutex<FakeState>,
    build_delay: Duration,
    fixed_port: Option<u16>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                next_port: 49000,
                ..FakeState::default()
            }),
            build_delay: Duration::ZERO,
            fixed_port: None,
        }
    }

    pub fn with_build_delay(mut self, delay: Duration) -> Self {
        self.build_delay = delay;
        self
    }

    /// Every container reports this host port (e.g. a mock HTTP server)
    pub fn with_fixed_port(mut self, port: u16) -> Self {
        self.fixed_port = Some(port);
        self
    }

    pub fn fail_builds_of(&self, image: &str) {
        self.state.lock().unwrap().build_failures.insert(image.to_string());
    }

    pub fn exit_on_start(&self, image: &str) {
        self.state.lock().unwrap().exiting_images.insert(image.to_string());
    }

    pub fn fail_stops_of(&self, container_name: &str) {
        self.state.lock().unwrap().stop_failures.insert(container_name.to_string());
    }

    pub fn allow_stops_of(&self, container_name: &str) {
        self.state.lock().unwrap().stop_failures.remove(container_name);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    pub fn delay_port_binding(&self, polls: u32) {
        self.state.lock().unwrap().unbound_polls = polls;
    }

    /// Simulate the container dying on its own
    pub fn crash(&self, name: &str, exit_code: i64) {
        let mut state = self.state.lock().unwrap();
        for container in state.containers.values_mut().filter(|c| c.name == name) {
            container.status = ContainerStatus::Exited;
            container.exit_code = Some(exit_code);
        }
    }

    pub fn forget_container(&self, name: &str) {
        self.state.lock().unwrap().containers.retain(|_, c| c.name != name);
    }

    pub fn container_named(&self, name: &str) -> Option<FakeContainer> {
        self.state
            .lock()
            .unwrap()
            .containers
            .values()
            .find(|c| c.name == name)
            .cloned()
    }

    pub fn container_count(&self) -> usize {
        self.state.lock().unwrap().containers.len()
    }

    pub fn has_image(&self, image: &str) -> bool {
        self.state.lock().unwrap().images.contains(image)
    }

    pub fn image_count(&self) -> usize {
        self.state.lock().unwrap().images.len()
    }

    pub fn build_count(&self) -> u32 {
        self.state.lock().unwrap().builds
    }

    fn check_available(&self) -> Result<(), RuntimeError> {
        if self.state.lock().unwrap().unavailable {
            return Err(RuntimeError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn build_image(&self, tag: &str, context: Vec<u8>) -> Result<BuildOutput, RuntimeError> {
        self.check_available()?;
        assert!(!context.is_empty(), "build context archive must not be empty");
        if !self.build_delay.is_zero() {
            tokio::time::sleep(self.build_delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.builds += 1;
        if state.build_failures.contains(tag) {
            return Err(RuntimeError::BuildFailed {
                message: "The command '/bin/sh -c pip install --no-cache-dir -r requirements.txt' returned a non-zero code: 1".to_string(),
                log: "Step 4/8 : RUN pip install --no-cache-dir -r requirements.txt\nERROR: No matching distribution found for nonexistent-package\n".to_string(),
            });
        }
        state.images.insert(tag.to_string());
        Ok(BuildOutput {
            log: "Successfully built".to_string(),
        })
    }

    async fn remove_image(&self, tag: &str) -> Result<(), RuntimeError> {
        self.check_available()?;
        self.state.lock().unwrap().images.remove(tag);
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId, RuntimeError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        if !state.images.contains(&spec.image) {
            return Err(RuntimeError::SpawnFailed(format!("No such image: {}", spec.image)));
        }
        if state.containers.values().any(|c| c.name == spec.name) {
            return Err(RuntimeError::SpawnFailed(format!(
                "Conflict. The container name \"/{}\" is already in use",
                spec.name
            )));
        }

        state.next_id += 1;
        let id = ContainerId::new(format!("fake-{:04}", state.next_id));
        state.containers.insert(
            id.clone(),
            FakeContainer {
                name: spec.name.clone(),
                image: spec.image.clone(),
                spec: spec.clone(),
                status: ContainerStatus::Created,
                host_port: None,
                exit_code: None,
            },
        );
        Ok(id)
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), RuntimeError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        let port = match self.fixed_port {
            Some(port) => port,
            None => {
                state.next_port += 1;
                state.next_port
            }
        };
        let exits = {
            let container = state
                .containers
                .get(id)
                .ok_or_else(|| RuntimeError::InstanceNotFound(id.to_string()))?;
            state.exiting_images.contains(&container.image)
        };

        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| RuntimeError::InstanceNotFound(id.to_string()))?;
        if exits {
            container.status = ContainerStatus::Exited;
            container.exit_code = Some(1);
        } else {
            container.status = ContainerStatus::Running;
            container.host_port = Some(port);
        }
        Ok(())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerState, RuntimeError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        let unbound = if state.unbound_polls > 0 {
            state.unbound_polls -= 1;
            true
        } else {
            false
        };

        let container = state
            .containers
            .get(id)
            .ok_or_else(|| RuntimeError::InstanceNotFound(id.to_string()))?;
        Ok(ContainerState {
            status: container.status,
            exit_code: container.exit_code,
            oom_killed: false,
            host_port: if unbound { None } else { container.host_port },
        })
    }

    async fn container_logs(&self, id: &ContainerId, _tail: usize) -> Result<String, RuntimeError> {
        self.check_available()?;
        let state = self.state.lock().unwrap();
        if !state.containers.contains_key(id) {
            return Err(RuntimeError::InstanceNotFound(id.to_string()));
        }
        Ok("Traceback (most recent call last):\nModuleNotFoundError: No module named 'torch'\n".to_string())
    }

    async fn stop_and_remove(&self, id: &ContainerId, _grace_secs: u32) -> Result<(), RuntimeError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        // Containers are addressable by id or by name
        let key = state
            .containers
            .iter()
            .find(|(cid, c)| *cid == id || c.name == id.as_str())
            .map(|(cid, c)| (cid.clone(), c.name.clone()));

        match key {
            Some((_, name)) if state.stop_failures.contains(&name) => {
                Err(RuntimeError::TerminationFailed(format!("cannot stop {}: device busy", name)))
            }
            Some((cid, _)) => {
                state.containers.remove(&cid);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Defaults with a private workspace and short timeouts
pub fn test_config(workspace: &Path) -> NodeConfig {
    let mut config = NodeConfig::default();
    config.runtime.workspace_dir = workspace.to_path_buf();
    config.runtime.public_host = "127.0.0.1".to_string();
    config.timeouts.build_seconds = 5;
    config.timeouts.start_seconds = 5;
    config.timeouts.predict_seconds = 5;
    config
}
