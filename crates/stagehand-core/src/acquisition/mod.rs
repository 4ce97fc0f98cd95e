//! Tool binary acquisition: strategy selection and execution.
//!
//! Exactly one of three strategies fires per run, decided in order: an
//! enterprise-classified step downloads the enterprise-hosted variant, a
//! `devel:` version builds the public tool from source, anything else
//! downloads the released tag from the public host.

pub mod github;

use crate::config::types::{ActionConfiguration, BinaryDescriptor, ToolVersion};
use crate::controller::RuntimeState;
use crate::enterprise::is_enterprise_step;
use crate::errors::StepError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The acquisition strategy chosen for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionStrategy {
    /// Download the enterprise-hosted tool variant.
    EnterpriseDownload,
    /// Build the public tool from the given git ref.
    SourceBuild { git_ref: String },
    /// Download the public tool's released tag.
    ReleaseDownload,
}

/// Decision table, evaluated in order, first match wins.
pub fn select_strategy(step_name: &str, version: &str) -> AcquisitionStrategy {
    if is_enterprise_step(step_name) {
        return AcquisitionStrategy::EnterpriseDownload;
    }
    match ToolVersion::parse(version) {
        ToolVersion::Source(git_ref) => AcquisitionStrategy::SourceBuild { git_ref },
        ToolVersion::Released(_) => AcquisitionStrategy::ReleaseDownload,
    }
}

/// External download/build service producing a usable executable path.
#[async_trait]
pub trait AcquisitionService: Send + Sync {
    /// Download the released version named by the descriptor.
    async fn download_release(
        &self,
        descriptor: &BinaryDescriptor,
        step_name: &str,
    ) -> Result<PathBuf, StepError>;

    /// Build the tool from source at the given git ref.
    async fn build_from_source(
        &self,
        descriptor: &BinaryDescriptor,
        git_ref: &str,
    ) -> Result<PathBuf, StepError>;
}

/// Executes the selected strategy and records the binary path in the run
/// state. The path is written exactly once per run.
pub struct BinaryAcquirer {
    service: Arc<dyn AcquisitionService>,
}

impl BinaryAcquirer {
    pub fn new(service: Arc<dyn AcquisitionService>) -> Self {
        Self { service }
    }

    pub async fn acquire(
        &self,
        cfg: &ActionConfiguration,
        state: &mut RuntimeState,
    ) -> Result<PathBuf, StepError> {
        let path = match select_strategy(&cfg.step_name, &cfg.tool.version) {
            AcquisitionStrategy::EnterpriseDownload => {
                self.service
                    .download_release(&cfg.enterprise_tool, &cfg.step_name)
                    .await?
            }
            AcquisitionStrategy::SourceBuild { git_ref } => {
                self.service.build_from_source(&cfg.tool, &git_ref).await?
            }
            AcquisitionStrategy::ReleaseDownload => {
                self.service
                    .download_release(&cfg.tool, &cfg.step_name)
                    .await?
            }
        };

        if path.as_os_str().is_empty() {
            return Err(StepError::Configuration(
                "acquired binary path is empty, check the step inputs".to_string(),
            ));
        }

        make_executable(&path).await?;
        log::debug!("obtained tool binary at {}", path.display());
        state.tool_path = Some(path.clone());
        Ok(path)
    }
}

/// Set owner-executable permission bits before any invocation attempt.
async fn make_executable(path: &Path) -> Result<(), StepError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            StepError::Acquisition(format!("cannot stat acquired binary {}: {}", path.display(), e))
        })?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o775);
        tokio::fs::set_permissions(path, permissions).await.map_err(|e| {
            StepError::Acquisition(format!(
                "cannot set executable permissions on {}: {}",
                path.display(),
                e
            ))
        })?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
