// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Node Configuration Types
//
// Settings consumed by the deployment manager:
// - Container runtime connection and image naming
// - Resource ceilings applied to every agent container
// - Build / start / stop / predict timeouts
// - HTTP API bind address

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use crate::domain::deployment::ResourceLimits;

/// Top-level node configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Path to Docker socket
    /// Default: auto-detect (DOCKER_HOST, then the platform default socket)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_socket_path: Option<String>,

    /// Optional Docker network for agent containers (None = default bridge)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,

    /// Base image of every agent build descriptor
    #[serde(default = "default_base_image")]
    pub base_image: String,

    /// Port the wrapped service listens on inside its container
    #[serde(default = "default_internal_port")]
    pub internal_port: u16,

    /// Host name used when composing agent service URLs
    #[serde(default = "default_public_host")]
    pub public_host: String,

    /// Image tag namespace, e.g. "smart-minions" → "smart-minions/agent-<id>:latest"
    #[serde(default = "default_image_namespace")]
    pub image_namespace: String,

    /// Container name prefix, e.g. "minion" → "minion-<id>"
    #[serde(default = "default_container_prefix")]
    pub container_prefix: String,

    /// Parent directory of per-agent build contexts
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            docker_socket_path: None,
            network_mode: None,
            base_image: default_base_image(),
            internal_port: default_internal_port(),
            public_host: default_public_host(),
            image_namespace: default_image_namespace(),
            container_prefix: default_container_prefix(),
            workspace_dir: default_workspace_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Memory ceiling per agent container, in MiB
    #[serde(default = "default_memory_mb")]
    pub memory_mb: u64,

    /// CPU share per agent container, in cores (fractions allowed)
    #[serde(default = "default_cpu_cores")]
    pub cpu_cores: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            memory_mb: default_memory_mb(),
            cpu_cores: default_cpu_cores(),
        }
    }
}

impl LimitsConfig {
    pub fn to_limits(&self) -> ResourceLimits {
        ResourceLimits {
            memory_mb: self.memory_mb,
            cpu_cores: self.cpu_cores,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_build_timeout")]
    pub build_seconds: u64,

    /// Covers create + start + host port readback
    #[serde(default = "default_start_timeout")]
    pub start_seconds: u64,

    /// Grace period given to a container before it is killed
    #[serde(default = "default_stop_grace")]
    pub stop_grace_seconds: u32,

    #[serde(default = "default_predict_timeout")]
    pub predict_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            build_seconds: default_build_timeout(),
            start_seconds: default_start_timeout(),
            stop_grace_seconds: default_stop_grace(),
            predict_seconds: default_predict_timeout(),
        }
    }
}

impl TimeoutConfig {
    pub fn build(&self) -> Duration {
        Duration::from_secs(self.build_seconds)
    }

    pub fn start(&self) -> Duration {
        Duration::from_secs(self.start_seconds)
    }

    pub fn predict(&self) -> Duration {
        Duration::from_secs(self.predict_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network bind address (e.g. "0.0.0.0" or "127.0.0.1")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP API port
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. MINIONS_CONFIG_PATH environment variable
    /// 2. ./minions-config.yaml (working directory)
    /// 3. ~/.minions/config.yaml (user home)
    /// 4. /etc/minions/config.yaml (Unix only)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("MINIONS_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./minions-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".minions").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/minions/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    /// This allows container deployments to override config via env vars
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("MINIONS_AGENT_MAX_MEMORY_MB") {
            match val.trim().parse::<u64>() {
                Ok(mb) => self.limits.memory_mb = mb,
                Err(_) => tracing::warn!("Invalid value for MINIONS_AGENT_MAX_MEMORY_MB: '{}'. Ignoring.", val),
            }
        }
        if let Some(val) = lookup("MINIONS_AGENT_CPU") {
            match val.trim().parse::<f64>() {
                Ok(cores) => self.limits.cpu_cores = cores,
                Err(_) => tracing::warn!("Invalid value for MINIONS_AGENT_CPU: '{}'. Ignoring.", val),
            }
        }
        if let Some(val) = lookup("MINIONS_BUILD_TIMEOUT_SECS") {
            match val.trim().parse::<u64>() {
                Ok(secs) => self.timeouts.build_seconds = secs,
                Err(_) => tracing::warn!("Invalid value for MINIONS_BUILD_TIMEOUT_SECS: '{}'. Ignoring.", val),
            }
        }
        if let Some(val) = lookup("MINIONS_START_TIMEOUT_SECS") {
            match val.trim().parse::<u64>() {
                Ok(secs) => self.timeouts.start_seconds = secs,
                Err(_) => tracing::warn!("Invalid value for MINIONS_START_TIMEOUT_SECS: '{}'. Ignoring.", val),
            }
        }
        if let Some(val) = lookup("MINIONS_IMAGE_NAMESPACE") {
            self.runtime.image_namespace = val;
        }
        if let Some(val) = lookup("MINIONS_PUBLIC_HOST") {
            self.runtime.public_host = val;
        }
        if let Some(val) = lookup("MINIONS_DOCKER_SOCKET") {
            self.runtime.docker_socket_path = Some(val);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.limits.memory_mb == 0 {
            anyhow::bail!("limits.memory_mb must be greater than zero");
        }
        if !self.limits.cpu_cores.is_finite() || self.limits.cpu_cores <= 0.0 {
            anyhow::bail!("limits.cpu_cores must be a positive number, got {}", self.limits.cpu_cores);
        }
        if self.timeouts.build_seconds == 0 || self.timeouts.start_seconds == 0 || self.timeouts.predict_seconds == 0 {
            anyhow::bail!("timeouts must be greater than zero");
        }
        if self.runtime.image_namespace.trim().is_empty() {
            anyhow::bail!("runtime.image_namespace cannot be empty");
        }
        if !is_valid_image_namespace(&self.runtime.image_namespace) {
            anyhow::bail!(
                "runtime.image_namespace '{}' is not a valid image repository prefix \
                 (lowercase letters, digits and separators, optionally led by a registry host)",
                self.runtime.image_namespace
            );
        }
        if self.runtime.container_prefix.trim().is_empty() {
            anyhow::bail!("runtime.container_prefix cannot be empty");
        }
        if self.runtime.internal_port == 0 {
            anyhow::bail!("runtime.internal_port cannot be 0");
        }
        if self.runtime.public_host.trim().is_empty() {
            anyhow::bail!("runtime.public_host cannot be empty");
        }
        Ok(())
    }
}

/// One path component of an image repository name.
static IMAGE_PATH_COMPONENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*$").expect("valid regex")
});

/// Registry host with an optional port, e.g. `registry.local:5000`.
static IMAGE_REGISTRY_HOST_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?)*(?::[0-9]+)?$")
        .expect("valid regex")
});

/// The namespace is joined as `<namespace>/agent-<id>:latest`, so it must be
/// a valid repository prefix on its own.
fn is_valid_image_namespace(namespace: &str) -> bool {
    let mut components: Vec<&str> = namespace.split('/').collect();
    let first = components[0];
    // Same rule the engine uses to tell a registry host from a path component
    if components.len() > 1 && (first.contains('.') || first.contains(':') || first == "localhost") {
        if !IMAGE_REGISTRY_HOST_RE.is_match(first) {
            return false;
        }
        components.remove(0);
    }
    components
        .iter()
        .all(|component| IMAGE_PATH_COMPONENT_RE.is_match(component))
}

// Default value functions
fn default_base_image() -> String {
    "python:3.9-slim".to_string()
}

fn default_internal_port() -> u16 {
    7860
}

fn default_public_host() -> String {
    "localhost".to_string()
}

fn default_image_namespace() -> String {
    "smart-minions".to_string()
}

fn default_container_prefix() -> String {
    "minion".to_string()
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("agents")
}

fn default_memory_mb() -> u64 {
    512
}

fn default_cpu_cores() -> f64 {
    1.0
}

fn default_build_timeout() -> u64 {
    600
}

fn default_start_timeout() -> u64 {
    60
}

fn default_stop_grace() -> u32 {
    10
}

fn default_predict_timeout() -> u64 {
    120
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    8000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_image_namespace_must_be_a_repository_prefix() {
        for namespace in ["smart-minions", "team/agents", "registry.local:5000/team", "localhost/minions", "a__b.c"] {
            let mut config = NodeConfig::default();
            config.runtime.image_namespace = namespace.to_string();
            assert!(config.validate().is_ok(), "{} should be accepted", namespace);
        }

        for namespace in ["Smart-Minions", "smart minions", "team//agents", "-leading", "trailing/", "bad_:tag"] {
            let mut config = NodeConfig::default();
            config.runtime.image_namespace = namespace.to_string();
            assert!(config.validate().is_err(), "{} should be rejected", namespace);
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = NodeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.runtime.internal_port, 7860);
        assert_eq!(config.runtime.image_namespace, "smart-minions");
        assert_eq!(config.limits.to_limits().memory_mb, 512);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config = NodeConfig::from_yaml_str(
            r#"
limits:
  memory_mb: 1024
timeouts:
  build_seconds: 30
"#,
        )
        .unwrap();

        assert_eq!(config.limits.memory_mb, 1024);
        assert_eq!(config.limits.cpu_cores, 1.0);
        assert_eq!(config.timeouts.build_seconds, 30);
        assert_eq!(config.timeouts.start_seconds, 60);
        assert_eq!(config.network.port, 8000);
    }

    #[test]
    fn test_env_overrides() {
        let vars = HashMap::from([
            ("MINIONS_AGENT_MAX_MEMORY_MB", "2048"),
            ("MINIONS_AGENT_CPU", "not-a-number"),
            ("MINIONS_IMAGE_NAMESPACE", "acme"),
        ]);
        let mut config = NodeConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.limits.memory_mb, 2048);
        assert_eq!(config.limits.cpu_cores, 1.0);
        assert_eq!(config.runtime.image_namespace, "acme");
    }

    #[test]
    fn test_validation() {
        let mut config = NodeConfig::default();

        config.limits.memory_mb = 0;
        assert!(config.validate().is_err());
        config.limits.memory_mb = 256;

        config.limits.cpu_cores = 0.0;
        assert!(config.validate().is_err());
        config.limits.cpu_cores = 0.5;

        config.timeouts.start_seconds = 0;
        assert!(config.validate().is_err());
        config.timeouts.start_seconds = 5;

        config.runtime.image_namespace = " ".to_string();
        assert!(config.validate().is_err());
    }
}
