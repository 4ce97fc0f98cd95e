//! Pipeline environment propagation across sequential controller runs.
//!
//! Each CI step is a fresh process, so pipeline variables survive between
//! steps only through the persisted store. `load` runs unconditionally before
//! any step logic; `export` runs near the end of a successful run when the
//! configuration switch is set.

use crate::errors::StepError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;

/// Name prefix of environment variables that belong to the pipeline
/// environment and are persisted across runs.
pub const PIPELINE_ENV_PREFIX: &str = "PIPELINE_ENV_";

/// Environment variable naming the store file; defaults to a workspace-local
/// path shared by all steps of one CI execution.
pub const STORE_PATH_ENV: &str = "STAGEHAND_PIPELINE_ENV_FILE";

const DEFAULT_STORE_PATH: &str = ".stagehand/pipeline-env.json";

/// Persistence collaborator for the pipeline environment.
#[async_trait]
pub trait EnvironmentStore: Send + Sync {
    /// Load the persisted variable set, or `None` when nothing was persisted.
    async fn load(&self) -> Result<Option<HashMap<String, String>>, StepError>;

    /// Persist the given variable set for a later run.
    async fn save(&self, env: &HashMap<String, String>) -> Result<(), StepError>;
}

/// JSON-file-backed store.
pub struct FileEnvironmentStore {
    path: PathBuf,
}

impl FileEnvironmentStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at the path named by `STAGEHAND_PIPELINE_ENV_FILE`, falling back
    /// to the workspace-local default.
    pub fn from_env() -> Self {
        let path = std::env::var(STORE_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORE_PATH));
        Self::new(path)
    }
}

#[async_trait]
impl EnvironmentStore for FileEnvironmentStore {
    async fn load(&self) -> Result<Option<HashMap<String, String>>, StepError> {
        match fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StepError::Propagation(format!(
                "cannot read pipeline environment from {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn save(&self, env: &HashMap<String, String>) -> Result<(), StepError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                StepError::Propagation(format!("cannot create store directory: {}", e))
            })?;
        }
        let raw = serde_json::to_string(env)?;
        fs::write(&self.path, raw).await.map_err(|e| {
            StepError::Propagation(format!(
                "cannot write pipeline environment to {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

/// Restores and exports pipeline variables through the store.
pub struct EnvironmentPropagator {
    store: Arc<dyn EnvironmentStore>,
}

impl EnvironmentPropagator {
    pub fn new(store: Arc<dyn EnvironmentStore>) -> Self {
        Self { store }
    }

    /// Restore persisted pipeline variables into the live process environment.
    pub async fn load(&self) -> Result<(), StepError> {
        let Some(entries) = self.store.load().await? else {
            log::debug!("no persisted pipeline environment found");
            return Ok(());
        };
        let count = entries.len();
        for (name, value) in entries {
            std::env::set_var(name, value);
        }
        log::debug!("restored {} pipeline environment entries", count);
        Ok(())
    }

    /// Serialize the live pipeline variables back to the store when enabled.
    pub async fn export(&self, enabled: bool) -> Result<(), StepError> {
        if !enabled {
            return Ok(());
        }
        let entries: HashMap<String, String> = std::env::vars()
            .filter(|(name, _)| name.starts_with(PIPELINE_ENV_PREFIX))
            .collect();
        log::debug!("exporting {} pipeline environment entries", entries.len());
        self.store.save(&entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::Mutex;

    /// In-memory store standing in for the persistence collaborator.
    struct FakeStore {
        entries: Mutex<Option<HashMap<String, String>>>,
    }

    impl FakeStore {
        fn empty() -> Self {
            Self {
                entries: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl EnvironmentStore for FakeStore {
        async fn load(&self) -> Result<Option<HashMap<String, String>>, StepError> {
            Ok(self.entries.lock().unwrap().clone())
        }

        async fn save(&self, env: &HashMap<String, String>) -> Result<(), StepError> {
            *self.entries.lock().unwrap() = Some(env.clone());
            Ok(())
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_export_then_load_round_trips() {
        std::env::set_var("PIPELINE_ENV_ARTIFACT_VERSION", "1.4.0");
        let store = Arc::new(FakeStore::empty());

        let propagator = EnvironmentPropagator::new(store.clone());
        propagator.export(true).await.unwrap();

        std::env::remove_var("PIPELINE_ENV_ARTIFACT_VERSION");

        // A fresh propagator over the same store simulates the next run.
        let next_run = EnvironmentPropagator::new(store);
        next_run.load().await.unwrap();
        assert_eq!(
            std::env::var("PIPELINE_ENV_ARTIFACT_VERSION").unwrap(),
            "1.4.0"
        );
        std::env::remove_var("PIPELINE_ENV_ARTIFACT_VERSION");
    }

    #[tokio::test]
    #[serial]
    async fn test_export_disabled_saves_nothing() {
        let store = Arc::new(FakeStore::empty());
        let propagator = EnvironmentPropagator::new(store.clone());
        propagator.export(false).await.unwrap();
        assert!(store.entries.lock().unwrap().is_none());
    }

    #[tokio::test]
    #[serial]
    async fn test_export_only_captures_prefixed_variables() {
        std::env::set_var("PIPELINE_ENV_STAGE", "build");
        std::env::set_var("UNRELATED_VARIABLE", "x");
        let store = Arc::new(FakeStore::empty());

        EnvironmentPropagator::new(store.clone())
            .export(true)
            .await
            .unwrap();

        let saved = store.entries.lock().unwrap().clone().unwrap();
        assert_eq!(saved.get("PIPELINE_ENV_STAGE").unwrap(), "build");
        assert!(!saved.contains_key("UNRELATED_VARIABLE"));
        std::env::remove_var("PIPELINE_ENV_STAGE");
        std::env::remove_var("UNRELATED_VARIABLE");
    }

    #[tokio::test]
    #[serial]
    async fn test_load_with_empty_store_is_a_no_op() {
        let propagator = EnvironmentPropagator::new(Arc::new(FakeStore::empty()));
        propagator.load().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileEnvironmentStore::new(dir.path().join("pipeline-env.json"));

        assert!(store.load().await.unwrap().is_none());

        let mut env = HashMap::new();
        env.insert("PIPELINE_ENV_COMMIT".to_string(), "abc123".to_string());
        store.save(&env).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, env);
    }
}
