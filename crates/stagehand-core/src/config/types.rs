//! Configuration record types for a single controller run.

/// Version prefix that requests a build of the tool from source instead of a
/// released download, e.g. `devel:feature-x`.
pub const SOURCE_VERSION_PREFIX: &str = "devel:";

/// A requested tool version, parsed from the raw version input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolVersion {
    /// A released tag to download, or empty for the latest release.
    Released(String),
    /// A git ref to build the tool from.
    Source(String),
}

impl ToolVersion {
    pub fn parse(version: &str) -> Self {
        match version.strip_prefix(SOURCE_VERSION_PREFIX) {
            Some(git_ref) => ToolVersion::Source(git_ref.to_string()),
            None => ToolVersion::Released(version.to_string()),
        }
    }
}

/// Everything needed to locate and fetch one variant of the tool binary.
///
/// The enterprise variant carries its own server/API endpoints and token; all
/// enterprise-related values live here rather than as flat fields on
/// [`ActionConfiguration`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryDescriptor {
    pub name: String,
    pub version: String,
    pub owner: String,
    pub repository: String,
    pub server_url: String,
    pub api_url: String,
    pub token: String,
}

/// The resolved configuration for one run, immutable once built.
///
/// At most one of the two binary descriptors is used to acquire an executable
/// per run; the acquisition decision table picks which.
#[derive(Debug, Clone, Default)]
pub struct ActionConfiguration {
    pub tool: BinaryDescriptor,
    pub enterprise_tool: BinaryDescriptor,
    pub step_name: String,
    pub flags: String,
    pub docker_image: String,
    pub docker_options: String,
    pub docker_env_vars: String,
    pub sidecar_image: String,
    pub sidecar_options: String,
    pub sidecar_env_vars: String,
    pub retrieve_default_config: bool,
    pub custom_defaults_paths: String,
    pub build_step_active_maps: bool,
    pub export_pipeline_environment: bool,
}
