//! Invocation of the acquired tool binary.
//!
//! Two invocations can occur per run: the unconditional `version` probe, and
//! the step invocation itself. The step runs inside the primary container
//! when one was started for it, otherwise as a local child process.

use crate::containers::ContainerRuntime;
use crate::errors::StepError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Mount point of the acquired tool's directory inside the primary container.
pub const CONTAINER_TOOL_DIR: &str = "/stagehand-bin";

/// Captured output of one tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs the tool binary, locally or inside a running container.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(
        &self,
        tool_path: &Path,
        args: &[String],
        container_id: Option<&str>,
    ) -> Result<ToolOutput, StepError>;
}

/// Real invoker: local child process, or an exec in the primary container.
pub struct ProcessToolInvoker {
    runtime: Arc<dyn ContainerRuntime>,
}

impl ProcessToolInvoker {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl ToolInvoker for ProcessToolInvoker {
    async fn invoke(
        &self,
        tool_path: &Path,
        args: &[String],
        container_id: Option<&str>,
    ) -> Result<ToolOutput, StepError> {
        match container_id {
            Some(id) => {
                let file_name = tool_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| {
                        StepError::Configuration(format!(
                            "invalid tool path: {}",
                            tool_path.display()
                        ))
                    })?;
                let mut cmd = vec![format!("{}/{}", CONTAINER_TOOL_DIR, file_name)];
                cmd.extend(args.iter().cloned());
                self.runtime.exec(id, cmd).await
            }
            None => {
                let output = tokio::process::Command::new(tool_path)
                    .args(args)
                    .output()
                    .await
                    .map_err(|e| {
                        StepError::Execution(format!(
                            "cannot start '{}': {}",
                            tool_path.display(),
                            e
                        ))
                    })?;
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                if !output.status.success() {
                    return Err(StepError::Execution(format!(
                        "'{} {}' exited with {}: {}",
                        tool_path.display(),
                        args.join(" "),
                        output
                            .status
                            .code()
                            .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                        stderr.trim()
                    )));
                }
                Ok(ToolOutput { stdout, stderr })
            }
        }
    }
}

/// Drives the diagnostic probe and the step invocation.
pub struct StepExecutor {
    invoker: Arc<dyn ToolInvoker>,
}

impl StepExecutor {
    pub fn new(invoker: Arc<dyn ToolInvoker>) -> Self {
        Self { invoker }
    }

    /// Liveness/compatibility probe. Output is logged, nothing is gated on it
    /// beyond error propagation.
    pub async fn version_probe(&self, tool_path: &Path) -> Result<(), StepError> {
        let output = self
            .invoker
            .invoke(tool_path, &["version".to_string()], None)
            .await?;
        log::info!("tool version: {}", output.stdout.trim());
        Ok(())
    }

    /// Invoke the resolved step with its whitespace-tokenized flags.
    pub async fn run_step(
        &self,
        tool_path: &Path,
        step_name: &str,
        flags: &str,
        container_id: Option<&str>,
    ) -> Result<(), StepError> {
        let mut args = vec![step_name.to_string()];
        args.extend(flags.split_whitespace().map(str::to_string));
        log::info!("executing step '{}'", step_name);
        let output = self.invoker.invoke(tool_path, &args, container_id).await?;
        if !output.stdout.is_empty() {
            log::info!("{}", output.stdout.trim_end());
        }
        if !output.stderr.is_empty() {
            log::warn!("{}", output.stderr.trim_end());
        }
        Ok(())
    }
}
