//! Resolution of step inputs into an [`ActionConfiguration`].
//!
//! For each recognized parameter the resolution order is: explicit step
//! input, then an environment override named `STAGEHAND_<UPPER_SNAKE>`, then
//! a declared default, then the empty string. Resolution never fails.

use crate::config::types::{ActionConfiguration, BinaryDescriptor};
use crate::enterprise::{on_enterprise_host, GITHUB_COM_API_URL, GITHUB_COM_SERVER_URL};
use std::collections::HashMap;
use std::env;

/// Namespace prefix for environment-variable overrides of step inputs.
pub const ENV_PREFIX: &str = "STAGEHAND_";

pub const PUBLIC_TOOL_NAME: &str = "conveyor";
pub const ENTERPRISE_TOOL_NAME: &str = "conveyor-ee";
pub const DEFAULT_TOOL_OWNER: &str = "open-pipeline";
pub const DEFAULT_TOOL_REPOSITORY: &str = "conveyor";

pub struct ConfigResolver;

impl ConfigResolver {
    /// Build the configuration for this run from explicit inputs, environment
    /// overrides, and declared defaults.
    pub fn resolve(inputs: &HashMap<String, String>) -> ActionConfiguration {
        let mut step_name = Self::get_value(inputs, "step-name", None);
        if step_name.is_empty() {
            let legacy = Self::get_value(inputs, "command", None);
            if !legacy.is_empty() {
                log::warn!("the 'command' input is deprecated, use 'step-name' instead");
                step_name = legacy;
            }
        }

        let (enterprise_server, enterprise_api) = if on_enterprise_host() {
            (
                env::var("GITHUB_SERVER_URL").unwrap_or_default(),
                env::var("GITHUB_API_URL").unwrap_or_default(),
            )
        } else {
            (String::new(), String::new())
        };

        ActionConfiguration {
            tool: BinaryDescriptor {
                name: PUBLIC_TOOL_NAME.to_string(),
                version: Self::get_value(inputs, "tool-version", None),
                owner: Self::get_value(inputs, "tool-owner", Some(DEFAULT_TOOL_OWNER)),
                repository: Self::get_value(
                    inputs,
                    "tool-repository",
                    Some(DEFAULT_TOOL_REPOSITORY),
                ),
                server_url: GITHUB_COM_SERVER_URL.to_string(),
                api_url: GITHUB_COM_API_URL.to_string(),
                token: Self::get_value(inputs, "github-token", None),
            },
            enterprise_tool: BinaryDescriptor {
                name: ENTERPRISE_TOOL_NAME.to_string(),
                version: Self::get_value(inputs, "enterprise-tool-version", None),
                owner: Self::get_value(inputs, "enterprise-tool-owner", None),
                repository: Self::get_value(inputs, "enterprise-tool-repository", None),
                server_url: enterprise_server,
                api_url: enterprise_api,
                token: Self::get_value(inputs, "github-enterprise-token", None),
            },
            step_name,
            flags: Self::get_value(inputs, "flags", None),
            docker_image: Self::get_value(inputs, "docker-image", None),
            docker_options: Self::get_value(inputs, "docker-options", None),
            docker_env_vars: Self::get_value(inputs, "docker-env-vars", None),
            sidecar_image: Self::get_value(inputs, "sidecar-image", None),
            sidecar_options: Self::get_value(inputs, "sidecar-options", None),
            sidecar_env_vars: Self::get_value(inputs, "sidecar-env-vars", None),
            retrieve_default_config: Self::get_bool(inputs, "retrieve-default-config"),
            custom_defaults_paths: Self::get_value(inputs, "custom-defaults-paths", None),
            build_step_active_maps: Self::get_bool(inputs, "build-step-active-maps"),
            export_pipeline_environment: Self::get_bool(inputs, "export-pipeline-environment"),
        }
    }

    fn get_value(
        inputs: &HashMap<String, String>,
        param: &str,
        default: Option<&str>,
    ) -> String {
        if let Some(value) = inputs.get(param) {
            if !value.is_empty() {
                log::debug!("{}: {}", param, value);
                return value.clone();
            }
        }
        let env_name = format!("{}{}", ENV_PREFIX, param.to_uppercase().replace('-', "_"));
        if let Ok(value) = env::var(&env_name) {
            if !value.is_empty() {
                log::debug!("{}: {} (from {})", param, value, env_name);
                return value;
            }
        }
        default.map(str::to_string).unwrap_or_default()
    }

    fn get_bool(inputs: &HashMap<String, String>, param: &str) -> bool {
        Self::get_value(inputs, param, None) == "true"
    }
}
