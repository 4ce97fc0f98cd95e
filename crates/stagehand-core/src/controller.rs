//! The controller: one linear run of stages with unconditional cleanup.
//!
//! `Init → ConfigResolved → BinaryAcquired → EnvLoaded → VersionChecked →
//! [DefaultConfigFetched] → [StepActiveMapsBuilt] → [ContainersStarted →
//! StepExecuted] → EnvExported → Cleanup`. A failure in any stage aborts the
//! remaining forward stages; cleanup runs exactly once on every exit path.

use crate::acquisition::{AcquisitionService, BinaryAcquirer};
use crate::config::types::ActionConfiguration;
use crate::config::ConfigResolver;
use crate::containers::{ContainerOrchestrator, ContainerRuntime};
use crate::enterprise::DefaultsService;
use crate::errors::StepError;
use crate::executor::{StepExecutor, ToolInvoker};
use crate::pipeline_env::{EnvironmentPropagator, EnvironmentStore};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Process-scoped run state: each field is written once, by the stage that
/// creates the corresponding resource, and read later only by execution and
/// cleanup. Discarded at run end.
#[derive(Debug, Default)]
pub struct RuntimeState {
    pub tool_path: Option<PathBuf>,
    pub container_id: Option<String>,
    pub network_id: Option<String>,
    pub sidecar_id: Option<String>,
}

pub struct Controller {
    acquirer: BinaryAcquirer,
    orchestrator: ContainerOrchestrator,
    propagator: EnvironmentPropagator,
    executor: StepExecutor,
    defaults: Arc<dyn DefaultsService>,
    enterprise_host: bool,
}

impl Controller {
    pub fn new(
        acquisition: Arc<dyn AcquisitionService>,
        runtime: Arc<dyn ContainerRuntime>,
        store: Arc<dyn EnvironmentStore>,
        invoker: Arc<dyn ToolInvoker>,
        defaults: Arc<dyn DefaultsService>,
        enterprise_host: bool,
    ) -> Self {
        Self {
            acquirer: BinaryAcquirer::new(acquisition),
            orchestrator: ContainerOrchestrator::new(runtime),
            propagator: EnvironmentPropagator::new(store),
            executor: StepExecutor::new(invoker),
            defaults,
            enterprise_host,
        }
    }

    /// Drive one full run. Cleanup of containers and network is the terminal
    /// action regardless of the outcome of the forward stages; its failures
    /// are folded into the returned report instead of being discarded.
    pub async fn run(&self, inputs: &HashMap<String, String>) -> Result<(), StepError> {
        let cfg = ConfigResolver::resolve(inputs);
        let mut state = RuntimeState::default();

        let result = self.run_stages(&cfg, &mut state).await;
        let cleanup_failures = self.orchestrator.cleanup(&mut state).await;

        match result {
            Ok(()) if cleanup_failures.is_empty() => Ok(()),
            Ok(()) => Err(StepError::Orchestration(format!(
                "cleanup failed: {}",
                cleanup_failures.join("; ")
            ))),
            Err(err) => Err(append_cleanup_failures(err, cleanup_failures)),
        }
    }

    async fn run_stages(
        &self,
        cfg: &ActionConfiguration,
        state: &mut RuntimeState,
    ) -> Result<(), StepError> {
        let tool_path = self.acquirer.acquire(cfg, state).await?;
        log::debug!("stage: binary acquired");

        self.propagator.load().await?;
        log::debug!("stage: pipeline environment loaded");

        self.executor.version_probe(&tool_path).await?;
        log::debug!("stage: version checked");

        if self.enterprise_host && cfg.retrieve_default_config {
            self.defaults
                .fetch_default_config(&tool_path, &cfg.enterprise_tool, &cfg.custom_defaults_paths)
                .await?;
            log::debug!("stage: default config fetched");
        }

        if cfg.build_step_active_maps {
            self.defaults
                .build_step_active_maps(&tool_path, &cfg.enterprise_tool)
                .await?;
            log::debug!("stage: step-active maps built");
        }

        if !cfg.step_name.is_empty() {
            self.orchestrator
                .run_containers(cfg, &tool_path, state)
                .await?;
            self.executor
                .run_step(
                    &tool_path,
                    &cfg.step_name,
                    &cfg.flags,
                    state.container_id.as_deref(),
                )
                .await?;
            log::debug!("stage: step executed");
        }

        self.propagator
            .export(cfg.export_pipeline_environment)
            .await?;
        log::debug!("stage: pipeline environment exported");
        Ok(())
    }
}

fn append_cleanup_failures(err: StepError, failures: Vec<String>) -> StepError {
    if failures.is_empty() {
        return err;
    }
    let suffix = format!("; cleanup also failed: {}", failures.join("; "));
    match err {
        StepError::Configuration(m) => StepError::Configuration(m + &suffix),
        StepError::Acquisition(m) => StepError::Acquisition(m + &suffix),
        StepError::Execution(m) => StepError::Execution(m + &suffix),
        StepError::Orchestration(m) => StepError::Orchestration(m + &suffix),
        StepError::Propagation(m) => StepError::Propagation(m + &suffix),
    }
}
