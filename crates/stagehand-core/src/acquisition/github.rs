//! GitHub-backed acquisition service.
//!
//! Released versions are fetched from the release API of the descriptor's
//! host (public or enterprise); source builds clone the repository at the
//! requested ref and run the tool's Go build.

use crate::acquisition::AcquisitionService;
use crate::config::types::BinaryDescriptor;
use crate::errors::StepError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

const USER_AGENT: &str = "stagehand";

#[derive(Debug, Clone)]
pub struct GitHubAcquisitionService {
    client: Client,
}

impl GitHubAcquisitionService {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn release_url(descriptor: &BinaryDescriptor) -> String {
        if descriptor.version.is_empty() || descriptor.version == "latest" {
            format!(
                "{}/repos/{}/{}/releases/latest",
                descriptor.api_url, descriptor.owner, descriptor.repository
            )
        } else {
            format!(
                "{}/repos/{}/{}/releases/tags/{}",
                descriptor.api_url, descriptor.owner, descriptor.repository, descriptor.version
            )
        }
    }
}

impl Default for GitHubAcquisitionService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AcquisitionService for GitHubAcquisitionService {
    async fn download_release(
        &self,
        descriptor: &BinaryDescriptor,
        step_name: &str,
    ) -> Result<PathBuf, StepError> {
        let url = Self::release_url(descriptor);
        let mut request = self.client.get(&url).header("User-Agent", USER_AGENT);
        if !descriptor.token.is_empty() {
            request = request.bearer_auth(&descriptor.token);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(StepError::Acquisition(format!(
                "release lookup at {} returned status {}",
                url,
                response.status()
            )));
        }
        let release: GitHubRelease = response
            .json()
            .await
            .map_err(|e| StepError::Acquisition(format!("cannot parse release response: {}", e)))?;

        let asset = find_matching_asset(&release, &descriptor.name).ok_or_else(|| {
            StepError::Acquisition(format!(
                "no release asset matches binary '{}' on platform '{}'",
                descriptor.name,
                platform_asset_format()
            ))
        })?;

        let target_dir = std::env::temp_dir()
            .join("stagehand")
            .join(&release.tag_name);
        let binary_path = target_dir.join(&descriptor.name);
        if fs::try_exists(&binary_path).await.unwrap_or(false) {
            log::debug!("reusing previously downloaded binary at {}", binary_path.display());
            return Ok(binary_path);
        }
        fs::create_dir_all(&target_dir).await.map_err(|e| {
            StepError::Acquisition(format!("cannot create download directory: {}", e))
        })?;

        // The asset API endpoint works for both public and enterprise hosts;
        // the token is required on the latter.
        let mut download = self
            .client
            .get(&asset.url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/octet-stream");
        if !descriptor.token.is_empty() {
            download = download.bearer_auth(&descriptor.token);
        }
        let response = download.send().await?;
        if !response.status().is_success() {
            return Err(StepError::Acquisition(format!(
                "asset download returned status {}",
                response.status()
            )));
        }
        let bytes = response.bytes().await?;
        fs::write(&binary_path, &bytes)
            .await
            .map_err(|e| StepError::Acquisition(format!("cannot write binary: {}", e)))?;

        log::info!(
            "downloaded {} {} for step '{}' to {}",
            descriptor.name,
            release.tag_name,
            step_name,
            binary_path.display()
        );
        Ok(binary_path)
    }

    async fn build_from_source(
        &self,
        descriptor: &BinaryDescriptor,
        git_ref: &str,
    ) -> Result<PathBuf, StepError> {
        let checkout = std::env::temp_dir()
            .join("stagehand")
            .join(format!("src-{}", Uuid::new_v4()));
        let repo_url = format!(
            "{}/{}/{}.git",
            descriptor.server_url, descriptor.owner, descriptor.repository
        );

        log::info!("building {} from source at ref '{}'", descriptor.name, git_ref);
        let checkout_arg = checkout.to_string_lossy().into_owned();
        let clone = tokio::process::Command::new("git")
            .args([
                "clone",
                "--depth",
                "1",
                "--branch",
                git_ref,
                repo_url.as_str(),
                checkout_arg.as_str(),
            ])
            .output()
            .await
            .map_err(|e| StepError::Acquisition(format!("cannot run git: {}", e)))?;
        if !clone.status.success() {
            return Err(StepError::Acquisition(format!(
                "git clone of {} at '{}' failed: {}",
                repo_url,
                git_ref,
                String::from_utf8_lossy(&clone.stderr).trim()
            )));
        }

        let binary_path = checkout.join(&descriptor.name);
        let output_arg = binary_path.to_string_lossy().into_owned();
        let build = tokio::process::Command::new("go")
            .args(["build", "-o", output_arg.as_str(), "."])
            .current_dir(&checkout)
            .env("CGO_ENABLED", "0")
            .output()
            .await
            .map_err(|e| StepError::Acquisition(format!("cannot run go build: {}", e)))?;
        if !build.status.success() {
            return Err(StepError::Acquisition(format!(
                "go build at ref '{}' failed: {}",
                git_ref,
                String::from_utf8_lossy(&build.stderr).trim()
            )));
        }

        Ok(binary_path)
    }
}

/// Convert the current platform to the format used in release asset names.
fn platform_asset_format() -> String {
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    };
    format!("{}-{}", os, arch)
}

fn find_matching_asset<'a>(release: &'a GitHubRelease, binary_name: &str) -> Option<&'a GitHubAsset> {
    let platform = platform_asset_format();
    let exact = format!("{}-{}", binary_name, platform);
    if let Some(asset) = release.assets.iter().find(|a| a.name == exact) {
        return Some(asset);
    }
    // Fall back to a bare asset named after the binary.
    release.assets.iter().find(|a| a.name == binary_name)
}

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
    assets: Vec<GitHubAsset>,
}

#[derive(Debug, Deserialize)]
struct GitHubAsset {
    name: String,
    url: String,
}
