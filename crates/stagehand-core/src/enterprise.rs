//! Enterprise host detection, enterprise step classification, and the
//! default-configuration collaborators.
//!
//! A run on an enterprise-hosted CI server additionally retrieves the
//! organization's default configuration and can pre-compute step-active maps;
//! both are side effects performed by invoking subcommands of the acquired
//! tool and live outside the controller's runtime state.

use crate::config::types::BinaryDescriptor;
use crate::errors::StepError;
use crate::executor::ToolInvoker;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub const GITHUB_COM_SERVER_URL: &str = "https://github.com";
pub const GITHUB_COM_API_URL: &str = "https://api.github.com";

/// Step names with this prefix require the enterprise-hosted tool variant.
pub const ENTERPRISE_STEP_PREFIX: &str = "enterprise";

/// Whether the current execution context is an enterprise-hosted server
/// rather than the public one.
pub fn on_enterprise_host() -> bool {
    match std::env::var("GITHUB_SERVER_URL") {
        Ok(url) => !url.is_empty() && url != GITHUB_COM_SERVER_URL,
        Err(_) => false,
    }
}

/// Whether the step is classified as requiring the enterprise tool variant.
pub fn is_enterprise_step(step_name: &str) -> bool {
    !step_name.is_empty() && step_name.starts_with(ENTERPRISE_STEP_PREFIX)
}

/// Default-configuration retrieval and step-active-map construction.
#[async_trait]
pub trait DefaultsService: Send + Sync {
    /// Retrieve the organization default configuration from the enterprise
    /// server, merging any custom defaults paths (comma-separated).
    async fn fetch_default_config(
        &self,
        tool_path: &Path,
        enterprise: &BinaryDescriptor,
        custom_defaults_paths: &str,
    ) -> Result<(), StepError>;

    /// Pre-compute the step-active condition maps for the pipeline.
    async fn build_step_active_maps(
        &self,
        tool_path: &Path,
        enterprise: &BinaryDescriptor,
    ) -> Result<(), StepError>;
}

/// Real implementation delegating to subcommands of the acquired tool.
pub struct ToolDefaultsService {
    invoker: Arc<dyn ToolInvoker>,
}

impl ToolDefaultsService {
    pub fn new(invoker: Arc<dyn ToolInvoker>) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl DefaultsService for ToolDefaultsService {
    async fn fetch_default_config(
        &self,
        tool_path: &Path,
        enterprise: &BinaryDescriptor,
        custom_defaults_paths: &str,
    ) -> Result<(), StepError> {
        let mut args = vec![
            "getDefaults".to_string(),
            "--server".to_string(),
            enterprise.server_url.clone(),
            "--owner".to_string(),
            enterprise.owner.clone(),
            "--repository".to_string(),
            enterprise.repository.clone(),
        ];
        for path in custom_defaults_paths.split(',').filter(|p| !p.is_empty()) {
            args.push("--defaultsFile".to_string());
            args.push(path.to_string());
        }
        let output = self.invoker.invoke(tool_path, &args, None).await?;
        log::debug!("getDefaults output: {}", output.stdout.trim());
        log::info!("retrieved default configuration");
        Ok(())
    }

    async fn build_step_active_maps(
        &self,
        tool_path: &Path,
        enterprise: &BinaryDescriptor,
    ) -> Result<(), StepError> {
        let args = vec![
            "checkIfStepActive".to_string(),
            "--server".to_string(),
            enterprise.server_url.clone(),
            "--stageOutputFile".to_string(),
            ".stagehand/stage-maps.json".to_string(),
            "--stepOutputFile".to_string(),
            ".stagehand/step-maps.json".to_string(),
        ];
        self.invoker.invoke(tool_path, &args, None).await?;
        log::info!("built step-active maps");
        Ok(())
    }
}
