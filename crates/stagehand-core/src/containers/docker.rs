//! Bollard-backed container runtime.

use super::{ContainerRuntime, ContainerSpec};
use crate::errors::StepError;
use crate::executor::ToolOutput;
use async_trait::async_trait;
use bollard::container::LogOutput;
#[allow(deprecated)]
use bollard::container::RemoveContainerOptions;
#[allow(deprecated)]
use bollard::exec::{CreateExecOptions, StartExecResults};
#[allow(deprecated)]
use bollard::image::CreateImageOptions;
use bollard::models::{ContainerCreateBody, EndpointSettings, HostConfig, NetworkingConfig};
#[allow(deprecated)]
use bollard::network::CreateNetworkOptions;
use bollard::query_parameters::{
    CreateContainerOptions as BollardCreateContainerOptionsQuery,
    StartContainerOptions as BollardStartContainerOptionsQuery,
};
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::collections::HashMap;

pub struct DockerContainerRuntime {
    docker: Docker,
}

impl DockerContainerRuntime {
    pub fn connect() -> Result<Self, StepError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }

    async fn pull_image(&self, image: &str) -> Result<(), StepError> {
        #[allow(deprecated)]
        let mut pull = self.docker.create_image(
            Some(CreateImageOptions {
                from_image: image.to_string(),
                ..Default::default()
            }),
            None,
            None,
        );
        while let Some(info) = pull.next().await {
            match info {
                Ok(info) => log::debug!("pulling {}: {:?}", image, info.status),
                Err(e) => return Err(StepError::Orchestration(format!("pull of {} failed: {}", image, e))),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for DockerContainerRuntime {
    async fn create_network(&self, name: &str) -> Result<(), StepError> {
        #[allow(deprecated)]
        self.docker
            .create_network(CreateNetworkOptions {
                name: name.to_string(),
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    async fn start_container(&self, spec: &ContainerSpec) -> Result<String, StepError> {
        self.pull_image(&spec.image).await?;

        let options = Some(BollardCreateContainerOptionsQuery {
            name: Some(spec.name.clone()),
            ..Default::default()
        });

        let mut host_config = HostConfig {
            ..Default::default()
        };
        if !spec.binds.is_empty() {
            host_config.binds = Some(spec.binds.clone());
        }
        if let Some(network) = &spec.network {
            host_config.network_mode = Some(network.clone());
        }

        let networking_config = match (&spec.network, &spec.network_alias) {
            (Some(network), Some(alias)) => {
                let mut endpoints = HashMap::new();
                endpoints.insert(
                    network.clone(),
                    EndpointSettings {
                        aliases: Some(vec![alias.clone()]),
                        ..Default::default()
                    },
                );
                Some(NetworkingConfig {
                    endpoints_config: Some(endpoints),
                })
            }
            _ => None,
        };

        let config = ContainerCreateBody {
            image: Some(spec.image.clone()),
            env: if spec.env.is_empty() {
                None
            } else {
                Some(spec.env.clone())
            },
            user: spec.user.clone(),
            working_dir: spec.workdir.clone(),
            // The primary container idles so the step can be exec'd into it.
            cmd: spec
                .keepalive
                .then(|| vec!["sleep".to_string(), "infinity".to_string()]),
            host_config: Some(host_config),
            networking_config,
            ..Default::default()
        };

        let container = self.docker.create_container(options, config).await?;
        self.docker
            .start_container(&container.id, None::<BollardStartContainerOptionsQuery>)
            .await?;
        Ok(container.id)
    }

    async fn exec(&self, container_id: &str, cmd: Vec<String>) -> Result<ToolOutput, StepError> {
        #[allow(deprecated)]
        let exec = self
            .docker
            .create_exec(
                container_id,
                CreateExecOptions::<String> {
                    cmd: Some(cmd.clone()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        let mut stdout = String::new();
        let mut stderr = String::new();
        if let StartExecResults::Attached { mut output, .. } =
            self.docker.start_exec(&exec.id, None).await?
        {
            while let Some(chunk) = output.next().await {
                match chunk? {
                    LogOutput::StdOut { message } => {
                        stdout.push_str(&String::from_utf8_lossy(&message));
                    }
                    LogOutput::StdErr { message } => {
                        stderr.push_str(&String::from_utf8_lossy(&message));
                    }
                    _ => {}
                }
            }
        }

        let inspect = self.docker.inspect_exec(&exec.id).await?;
        if let Some(code) = inspect.exit_code {
            if code != 0 {
                return Err(StepError::Execution(format!(
                    "'{}' in container {} exited with {}: {}",
                    cmd.join(" "),
                    container_id,
                    code,
                    stderr.trim()
                )));
            }
        }
        Ok(ToolOutput { stdout, stderr })
    }

    async fn remove_container(&self, container_id: &str) -> Result<(), StepError> {
        #[allow(deprecated)]
        self.docker
            .remove_container(
                container_id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await?;
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> Result<(), StepError> {
        self.docker.remove_network(name).await?;
        Ok(())
    }
}
