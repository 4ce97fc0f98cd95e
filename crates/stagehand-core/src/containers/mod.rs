//! Container orchestration for the step: a primary container and an optional
//! network-attached sidecar.
//!
//! Resource identifiers are recorded in [`RuntimeState`] at creation time so
//! the cleanup stage can release them even after an unrelated failure much
//! later in the run. Teardown happens in reverse creation order and is
//! attempted exactly once per run.

pub mod docker;

use crate::config::types::ActionConfiguration;
use crate::controller::RuntimeState;
use crate::errors::StepError;
use crate::executor::{ToolOutput, CONTAINER_TOOL_DIR};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Working directory mounted into the primary container.
pub const CONTAINER_WORKDIR: &str = "/project";

/// Network alias under which the primary container reaches the sidecar.
pub const SIDECAR_ALIAS: &str = "sidecar";

/// Everything the runtime needs to create and start one container.
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// `KEY=VALUE` entries.
    pub env: Vec<String>,
    pub user: Option<String>,
    pub workdir: Option<String>,
    /// `host:container` bind mounts.
    pub binds: Vec<String>,
    pub network: Option<String>,
    pub network_alias: Option<String>,
    /// Keep the container alive so the step can be exec'd into it.
    pub keepalive: bool,
}

/// Container runtime collaborator, keyed by generated identifiers.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn create_network(&self, name: &str) -> Result<(), StepError>;

    /// Create and start a container, returning its identifier.
    async fn start_container(&self, spec: &ContainerSpec) -> Result<String, StepError>;

    /// Run a command inside a running container.
    async fn exec(&self, container_id: &str, cmd: Vec<String>) -> Result<ToolOutput, StepError>;

    async fn remove_container(&self, container_id: &str) -> Result<(), StepError>;

    async fn remove_network(&self, name: &str) -> Result<(), StepError>;
}

/// Starts and tears down the step's containers.
pub struct ContainerOrchestrator {
    runtime: Arc<dyn ContainerRuntime>,
}

impl ContainerOrchestrator {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Start the primary container, and the sidecar with a private network
    /// when one is configured. No-op when no image is configured.
    pub async fn run_containers(
        &self,
        cfg: &ActionConfiguration,
        tool_path: &Path,
        state: &mut RuntimeState,
    ) -> Result<(), StepError> {
        if cfg.docker_image.is_empty() {
            return Ok(());
        }
        let run_id = Uuid::new_v4();

        if !cfg.sidecar_image.is_empty() {
            let network = format!("sidecar-{}", run_id);
            self.runtime.create_network(&network).await?;
            state.network_id = Some(network.clone());
            log::debug!("created network {}", network);

            let mut sidecar = ContainerSpec {
                name: format!("stagehand-sidecar-{}", run_id),
                image: cfg.sidecar_image.clone(),
                env: parse_env_vars(&cfg.sidecar_env_vars),
                network: Some(network),
                network_alias: Some(SIDECAR_ALIAS.to_string()),
                ..Default::default()
            };
            apply_options(&mut sidecar, &cfg.sidecar_options);
            let sidecar_id = self.runtime.start_container(&sidecar).await?;
            log::info!("started sidecar container {} ({})", sidecar.name, cfg.sidecar_image);
            state.sidecar_id = Some(sidecar_id);
        }

        let tool_dir = tool_path.parent().unwrap_or_else(|| Path::new("."));
        let workspace = std::env::current_dir().map_err(|e| {
            StepError::Orchestration(format!("cannot determine working directory: {}", e))
        })?;
        let mut primary = ContainerSpec {
            name: format!("stagehand-{}", run_id),
            image: cfg.docker_image.clone(),
            env: parse_env_vars(&cfg.docker_env_vars),
            workdir: Some(CONTAINER_WORKDIR.to_string()),
            binds: vec![
                format!("{}:{}", workspace.display(), CONTAINER_WORKDIR),
                format!("{}:{}", tool_dir.display(), CONTAINER_TOOL_DIR),
            ],
            network: state.network_id.clone(),
            keepalive: true,
            ..Default::default()
        };
        apply_options(&mut primary, &cfg.docker_options);
        let container_id = self.runtime.start_container(&primary).await?;
        log::info!("started container {} ({})", primary.name, cfg.docker_image);
        state.container_id = Some(container_id);
        Ok(())
    }

    /// Release sidecar, primary container, and network, in that order.
    ///
    /// Identifiers are taken out of the state so a second call is a no-op.
    /// Failures are collected rather than escalated; the controller folds
    /// them into the run's final report.
    pub async fn cleanup(&self, state: &mut RuntimeState) -> Vec<String> {
        let mut failures = Vec::new();
        if let Some(id) = state.sidecar_id.take() {
            if let Err(e) = self.runtime.remove_container(&id).await {
                failures.push(format!("sidecar container {}: {}", id, e));
            }
        }
        if let Some(id) = state.container_id.take() {
            if let Err(e) = self.runtime.remove_container(&id).await {
                failures.push(format!("container {}: {}", id, e));
            }
        }
        if let Some(network) = state.network_id.take() {
            if let Err(e) = self.runtime.remove_network(&network).await {
                failures.push(format!("network {}: {}", network, e));
            }
        }
        for failure in &failures {
            log::warn!("cleanup failure: {}", failure);
        }
        failures
    }
}

/// Tokenize a whitespace-separated `KEY=VALUE` string.
fn parse_env_vars(raw: &str) -> Vec<String> {
    raw.split_whitespace()
        .filter(|entry| {
            let well_formed = entry.contains('=');
            if !well_formed {
                log::warn!("ignoring malformed env var entry '{}'", entry);
            }
            well_formed
        })
        .map(str::to_string)
        .collect()
}

/// Apply the supported subset of docker CLI options to the spec.
fn apply_options(spec: &mut ContainerSpec, raw: &str) {
    let mut tokens = raw.split_whitespace();
    while let Some(token) = tokens.next() {
        match token {
            "-u" | "--user" => spec.user = tokens.next().map(str::to_string),
            "-w" | "--workdir" => spec.workdir = tokens.next().map(str::to_string),
            "-v" | "--volume" => {
                if let Some(bind) = tokens.next() {
                    spec.binds.push(bind.to_string());
                }
            }
            "-e" | "--env" => {
                if let Some(entry) = tokens.next() {
                    spec.env.push(entry.to_string());
                }
            }
            other => log::warn!("ignoring unsupported container option '{}'", other),
        }
    }
}
