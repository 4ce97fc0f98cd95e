//! Core library for the stagehand CI-step controller.
//!
//! Stagehand drives a single CI step from start to finish: it resolves the
//! step configuration, acquires the pipeline tool binary (released download,
//! enterprise-hosted download, or build-from-source), restores the persisted
//! pipeline environment, optionally starts a container pair for the step,
//! invokes the tool, and exports the environment for the next run. The
//! controller guarantees container teardown on every exit path.
//!
//! # Architecture Overview
//!
//! - **Configuration**: input/env/default resolution into one immutable record
//! - **Acquisition**: three-way strategy selection and binary download/build
//! - **Environment propagation**: pipeline variables persisted across runs
//! - **Container orchestration**: primary container plus optional sidecar
//! - **Execution**: diagnostic probe and step invocation of the acquired tool
//! - **Controller**: the linear stage sequence with unconditional cleanup

pub mod acquisition;
pub mod config;
pub mod containers;
pub mod controller;
pub mod enterprise;
pub mod errors;
pub mod executor;
pub mod pipeline_env;

pub use config::{ActionConfiguration, BinaryDescriptor, ConfigResolver, ToolVersion};
pub use controller::{Controller, RuntimeState};
pub use errors::StepError;

#[cfg(test)]
pub mod test_utils;
