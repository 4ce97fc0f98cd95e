//! Fake collaborators shared across the crate's tests.

use crate::acquisition::AcquisitionService;
use crate::config::types::BinaryDescriptor;
use crate::containers::{ContainerRuntime, ContainerSpec};
use crate::enterprise::DefaultsService;
use crate::errors::StepError;
use crate::executor::{ToolInvoker, ToolOutput};
use crate::pipeline_env::EnvironmentStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// What the fake acquisition service was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionCall {
    Release { name: String, version: String },
    Source { git_ref: String },
}

/// Acquisition service returning a real (temporary) file so permission bits
/// can be set on it.
pub struct FakeAcquisitionService {
    binary: Option<tempfile::NamedTempFile>,
    empty_path: bool,
    fail: bool,
    calls: Mutex<Vec<AcquisitionCall>>,
}

impl FakeAcquisitionService {
    pub fn new() -> Self {
        Self {
            binary: Some(tempfile::NamedTempFile::new().unwrap()),
            empty_path: false,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Return an empty path from every acquisition.
    pub fn returning_empty_path() -> Self {
        Self {
            binary: None,
            empty_path: true,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail every acquisition.
    pub fn failing() -> Self {
        Self {
            binary: None,
            empty_path: false,
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<AcquisitionCall> {
        self.calls.lock().unwrap().clone()
    }

    fn path(&self) -> Result<PathBuf, StepError> {
        if self.fail {
            return Err(StepError::Acquisition(
                "download service unavailable".to_string(),
            ));
        }
        if self.empty_path {
            return Ok(PathBuf::new());
        }
        Ok(self.binary.as_ref().unwrap().path().to_path_buf())
    }
}

#[async_trait]
impl AcquisitionService for FakeAcquisitionService {
    async fn download_release(
        &self,
        descriptor: &BinaryDescriptor,
        _step_name: &str,
    ) -> Result<PathBuf, StepError> {
        self.calls.lock().unwrap().push(AcquisitionCall::Release {
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
        });
        self.path()
    }

    async fn build_from_source(
        &self,
        _descriptor: &BinaryDescriptor,
        git_ref: &str,
    ) -> Result<PathBuf, StepError> {
        self.calls.lock().unwrap().push(AcquisitionCall::Source {
            git_ref: git_ref.to_string(),
        });
        self.path()
    }
}

/// Recording container runtime with optional failure injection.
pub struct FakeContainerRuntime {
    started: Mutex<Vec<ContainerSpec>>,
    removed: Mutex<Vec<String>>,
    networks: Mutex<Vec<String>>,
    removed_networks: Mutex<Vec<String>>,
    next_id: AtomicUsize,
    fail_start: bool,
    fail_remove: bool,
}

impl FakeContainerRuntime {
    pub fn new() -> Self {
        Self {
            started: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            networks: Mutex::new(Vec::new()),
            removed_networks: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(0),
            fail_start: false,
            fail_remove: false,
        }
    }

    pub fn fail_start_container(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn fail_remove_container(mut self) -> Self {
        self.fail_remove = true;
        self
    }

    pub fn started_containers(&self) -> Vec<ContainerSpec> {
        self.started.lock().unwrap().clone()
    }

    pub fn created_networks(&self) -> Vec<String> {
        self.networks.lock().unwrap().clone()
    }

    pub fn removed_containers(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }

    pub fn removed_networks(&self) -> Vec<String> {
        self.removed_networks.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerRuntime for FakeContainerRuntime {
    async fn create_network(&self, name: &str) -> Result<(), StepError> {
        self.networks.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn start_container(&self, spec: &ContainerSpec) -> Result<String, StepError> {
        if self.fail_start {
            return Err(StepError::Orchestration(format!(
                "cannot start container {}",
                spec.name
            )));
        }
        self.started.lock().unwrap().push(spec.clone());
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("container-{}", id))
    }

    async fn exec(&self, _container_id: &str, _cmd: Vec<String>) -> Result<ToolOutput, StepError> {
        Ok(ToolOutput::default())
    }

    async fn remove_container(&self, container_id: &str) -> Result<(), StepError> {
        if self.fail_remove {
            return Err(StepError::Orchestration(format!(
                "cannot remove container {}",
                container_id
            )));
        }
        self.removed.lock().unwrap().push(container_id.to_string());
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> Result<(), StepError> {
        self.removed_networks.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

/// Recording tool invoker with failure injection keyed on the first argument.
pub struct RecordingInvoker {
    calls: Mutex<Vec<(Vec<String>, Option<String>)>>,
    fail_on: Option<String>,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: None,
        }
    }

    /// Fail the invocation whose first argument equals `arg`.
    pub fn failing_on(arg: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: Some(arg.to_string()),
        }
    }

    pub fn invocations(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(args, _)| args.clone())
            .collect()
    }

    pub fn container_targets(&self) -> Vec<Option<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, target)| target.clone())
            .collect()
    }
}

#[async_trait]
impl ToolInvoker for RecordingInvoker {
    async fn invoke(
        &self,
        _tool_path: &Path,
        args: &[String],
        container_id: Option<&str>,
    ) -> Result<ToolOutput, StepError> {
        self.calls
            .lock()
            .unwrap()
            .push((args.to_vec(), container_id.map(str::to_string)));
        if let Some(fail_on) = &self.fail_on {
            if args.first() == Some(fail_on) {
                return Err(StepError::Execution(format!("'{}' exited with 1", fail_on)));
            }
        }
        Ok(ToolOutput::default())
    }
}

/// In-memory environment store with failure injection.
pub struct FakeEnvironmentStore {
    entries: Mutex<Option<HashMap<String, String>>>,
    saved: Mutex<Vec<HashMap<String, String>>>,
    load_calls: AtomicUsize,
    fail_load: bool,
    fail_save: bool,
}

impl FakeEnvironmentStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(None),
            saved: Mutex::new(Vec::new()),
            load_calls: AtomicUsize::new(0),
            fail_load: false,
            fail_save: false,
        }
    }

    pub fn failing_load() -> Self {
        Self {
            fail_load: true,
            ..Self::new()
        }
    }

    pub fn failing_save() -> Self {
        Self {
            fail_save: true,
            ..Self::new()
        }
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn saved(&self) -> Vec<HashMap<String, String>> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl EnvironmentStore for FakeEnvironmentStore {
    async fn load(&self) -> Result<Option<HashMap<String, String>>, StepError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_load {
            return Err(StepError::Propagation("store unreadable".to_string()));
        }
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn save(&self, env: &HashMap<String, String>) -> Result<(), StepError> {
        if self.fail_save {
            return Err(StepError::Propagation("store unwritable".to_string()));
        }
        self.saved.lock().unwrap().push(env.clone());
        Ok(())
    }
}

/// Recording defaults collaborator.
pub struct FakeDefaultsService {
    fetch_calls: AtomicUsize,
    map_calls: AtomicUsize,
    fail: bool,
}

impl FakeDefaultsService {
    pub fn new() -> Self {
        Self {
            fetch_calls: AtomicUsize::new(0),
            map_calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn map_calls(&self) -> usize {
        self.map_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DefaultsService for FakeDefaultsService {
    async fn fetch_default_config(
        &self,
        _tool_path: &Path,
        _enterprise: &BinaryDescriptor,
        _custom_defaults_paths: &str,
    ) -> Result<(), StepError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(StepError::Configuration(
                "default config unavailable".to_string(),
            ));
        }
        Ok(())
    }

    async fn build_step_active_maps(
        &self,
        _tool_path: &Path,
        _enterprise: &BinaryDescriptor,
    ) -> Result<(), StepError> {
        self.map_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(StepError::Configuration(
                "step-active maps unavailable".to_string(),
            ));
        }
        Ok(())
    }
}
