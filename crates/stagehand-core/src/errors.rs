//! Error types for failure handling across the controller.
//!
//! Every stage of a run reports through [`StepError`]. The controller catches
//! the first stage failure, runs cleanup, and collapses the error into a
//! single human-readable message at the CLI boundary; no structured kind
//! survives to the run's visible output.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum StepError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("binary acquisition failed: {0}")]
    Acquisition(String),
    #[error("step execution failed: {0}")]
    Execution(String),
    #[error("container orchestration failed: {0}")]
    Orchestration(String),
    #[error("pipeline environment propagation failed: {0}")]
    Propagation(String),
}

impl From<reqwest::Error> for StepError {
    fn from(err: reqwest::Error) -> Self {
        StepError::Acquisition(err.to_string())
    }
}

impl From<bollard::errors::Error> for StepError {
    fn from(err: bollard::errors::Error) -> Self {
        StepError::Orchestration(err.to_string())
    }
}

impl From<serde_json::Error> for StepError {
    fn from(err: serde_json::Error) -> Self {
        StepError::Propagation(err.to_string())
    }
}
