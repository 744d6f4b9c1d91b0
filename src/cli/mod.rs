//! Command line interface for the bundle creator.
//!
//! Parses arguments, loads the project configuration, wires the real
//! collaborators (HTTP downloader, tokio subprocesses, PATH tool probes)
//! into a [`PipelineEnv`] and runs the pipeline.

mod args;
mod output;

pub use args::{Args, DEFAULT_SUPPORT_REGISTRY, RuntimeConfig};
pub use output::OutputManager;

use crate::{
    bundler::{
        CreatePipeline, HostEnvironment, PipelineEnv, PipelineOptions, ToolCache,
        builder::SystemToolProvider,
        platform,
        utils::{HttpDownloader, TokioSubprocess},
    },
    error::{CliError, Result},
    metadata,
};
use std::sync::Arc;
use url::Url;

/// Main CLI entry point; returns the process exit code.
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    execute(&args).await
}

/// Runs the pipeline for already parsed arguments.
pub async fn execute(args: &Args) -> Result<i32> {
    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;
    let (platform_name, format_name) = args.target()?;
    let format = platform::lookup(&platform_name, &format_name).ok_or_else(|| {
        CliError::InvalidArguments {
            reason: format!("Unknown output format {platform_name} {format_name}"),
        }
    })?;

    let runtime = RuntimeConfig::from(args);
    let output = runtime.output();

    let project = metadata::load_project(&args.config, format.platform(), format.output_format())?;
    let apps = project.select(&args.apps)?;
    output.section(&format!("Creating {} bundles", format.description()))?;
    output.verbose(&format!("Project root: {}", runtime.base_path.display()))?;
    output.verbose(&format!("Data path: {}", runtime.data_path.display()))?;

    let support_registry = Url::parse(&args.support_registry).map_err(|e| {
        CliError::InvalidArguments {
            reason: format!("Invalid support registry: {e}"),
        }
    })?;
    let mut options = PipelineOptions::new(support_registry);
    options.regenerate = args.regenerate;
    options.test_mode = args.test;
    options.runtime = args.runtime.clone();
    options.template_registry = args.template_registry.clone();

    let subprocess = Arc::new(TokioSubprocess::new(runtime.timeout));
    let env = PipelineEnv {
        host: HostEnvironment::detect(format.supported_host_os().iter().copied()),
        base_path: runtime.base_path.clone(),
        data_path: runtime.data_path.clone(),
        tools: ToolCache::new(Arc::new(SystemToolProvider::new(subprocess.clone()))),
        subprocess,
        downloader: Arc::new(HttpDownloader::new(runtime.timeout)?),
        options,
    };

    let summary = CreatePipeline::new(format.as_ref(), &env, output)
        .run(apps)
        .await?;
    Ok(summary.status().exit_code())
}
