//! CLI entry point: gathers step inputs, wires the real collaborators, and
//! maps the run outcome to the process exit code.

use clap::Parser;
use log::LevelFilter;
use stagehand_core::acquisition::github::GitHubAcquisitionService;
use stagehand_core::containers::docker::DockerContainerRuntime;
use stagehand_core::enterprise::{on_enterprise_host, ToolDefaultsService};
use stagehand_core::executor::ProcessToolInvoker;
use stagehand_core::pipeline_env::FileEnvironmentStore;
use stagehand_core::Controller;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[clap(
    name = "stagehand",
    version = "0.1.0",
    about = "CI-step controller: acquires the pipeline tool and runs one step"
)]
struct Cli {
    /// Step input as `key=value`; repeatable. Overrides `INPUT_*` variables.
    #[clap(long = "input", value_name = "KEY=VALUE")]
    inputs: Vec<String>,

    #[clap(long, short, default_value = "info")]
    log_level: String,
}

/// Inputs arrive the way a CI runner passes them: `INPUT_<UPPER_SNAKE>`
/// environment variables, overridable from the command line.
fn collect_inputs(cli: &Cli) -> anyhow::Result<HashMap<String, String>> {
    let mut inputs = HashMap::new();
    for (name, value) in std::env::vars() {
        if let Some(param) = name.strip_prefix("INPUT_") {
            inputs.insert(param.to_lowercase().replace('_', "-"), value);
        }
    }
    for entry in &cli.inputs {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("invalid --input '{}', expected KEY=VALUE", entry))?;
        inputs.insert(key.to_string(), value.to_string());
    }
    Ok(inputs)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    let inputs = collect_inputs(&cli)?;

    let runtime = Arc::new(
        DockerContainerRuntime::connect()
            .map_err(|e| anyhow::anyhow!("cannot connect to container runtime: {}", e))?,
    );
    let invoker = Arc::new(ProcessToolInvoker::new(runtime.clone()));
    let controller = Controller::new(
        Arc::new(GitHubAcquisitionService::new()),
        runtime,
        Arc::new(FileEnvironmentStore::from_env()),
        invoker.clone(),
        Arc::new(ToolDefaultsService::new(invoker)),
        on_enterprise_host(),
    );

    if let Err(err) = controller.run(&inputs).await {
        // Workflow-command error line, the single user-visible failure report.
        println!("::error::{}", err);
        std::process::exit(1);
    }
    Ok(())
}
