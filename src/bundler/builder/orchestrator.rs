//! Main pipeline orchestration.
//!
//! This module provides the [`CreatePipeline`] that runs the verification
//! gate and installer stages, in a fixed order, for each app of a run.

use super::{
    actions::{ActionRecord, AppReport, Outcome, Reporter, RunSummary, Stage},
    gate,
    tool_detection::ToolCache,
};
use crate::bundler::{
    error::Result,
    platform::{AppStage, OutputFormat, Progress},
    settings::{AppConfig, HostEnvironment},
    utils::{Downloader, Subprocess, checksum::calculate_sha256},
};
use std::{path::PathBuf, sync::Arc};
use url::Url;

/// Per-app stages after `finalize_app_config`, in execution order.
pub const APP_STAGES: &[Stage] = &[
    Stage::VerifyAppTemplate,
    Stage::VerifyAppTools,
    Stage::GenerateAppTemplate,
    Stage::InstallAppSupportPackage,
    Stage::InstallAppRequirements,
    Stage::InstallAppCode,
    Stage::InstallAppResources,
    Stage::InstallStubBinary,
    Stage::CleanupAppContent,
];

/// Options that apply to every app in a run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Replace existing bundles instead of skipping generation.
    pub regenerate: bool,
    /// Install test sources and requirements.
    pub test_mode: bool,
    /// Runtime executable used for version detection and requirement installs.
    pub runtime: String,
    /// Base URL of the support package and stub registry.
    pub support_registry: Url,
    /// Organization (or URL prefix) default templates are fetched from.
    pub template_registry: String,
}

impl PipelineOptions {
    /// Options with default runtime and template registry.
    pub fn new(support_registry: Url) -> Self {
        Self {
            regenerate: false,
            test_mode: false,
            runtime: "python3".into(),
            support_registry,
            template_registry: "cyrup-ai".into(),
        }
    }
}

/// Run-wide collaborators and state, passed by reference to every stage.
pub struct PipelineEnv {
    pub host: HostEnvironment,
    /// Project root; sources and resources are relative to it.
    pub base_path: PathBuf,
    /// Cache directory for template clones and downloads.
    pub data_path: PathBuf,
    /// Verified tools; the only state shared between apps.
    pub tools: ToolCache,
    pub subprocess: Arc<dyn Subprocess>,
    pub downloader: Arc<dyn Downloader>,
    pub options: PipelineOptions,
}

impl std::fmt::Debug for PipelineEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineEnv")
            .field("host", &self.host)
            .field("base_path", &self.base_path)
            .field("data_path", &self.data_path)
            .field("tools", &self.tools)
            .field("options", &self.options)
            .finish()
    }
}

/// Creates bundles for a list of apps in one output format.
///
/// Apps run one after another. A run-wide failure (unsupported host, missing
/// tool) ends the run with an error; an app failure ends that app only and
/// the next app starts.
pub struct CreatePipeline<'a> {
    format: &'a dyn OutputFormat,
    env: &'a PipelineEnv,
    reporter: &'a dyn Reporter,
}

impl std::fmt::Debug for CreatePipeline<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreatePipeline")
            .field("format", &self.format.description())
            .field("env", &self.env)
            .finish()
    }
}

impl<'a> CreatePipeline<'a> {
    /// Creates a pipeline for `format`.
    pub fn new(format: &'a dyn OutputFormat, env: &'a PipelineEnv, reporter: &'a dyn Reporter) -> Self {
        Self {
            format,
            env,
            reporter,
        }
    }

    /// Runs the pipeline for every app.
    ///
    /// # Errors
    ///
    /// Only run-wide failures are returned as errors. Per-app failures are
    /// recorded in the returned [`RunSummary`].
    pub async fn run(&self, apps: Vec<AppConfig>) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        let result = gate::verify_host(&self.env.host, self.format);
        self.record(&mut summary, Stage::VerifyHost, None, &result);
        result?;

        let result = gate::verify_tools(self.env, self.format).await;
        self.record(&mut summary, Stage::VerifyTools, None, &result);
        result?;

        for app in apps {
            let report = self.create_app(app, &mut summary).await;
            summary.apps.push(report);
        }

        self.reporter.finished(&summary);
        Ok(summary)
    }

    /// Runs every per-app stage for one app, stopping at the first failure.
    pub async fn create_app(&self, mut app: AppConfig, summary: &mut RunSummary) -> AppReport {
        let name = app.app_name.clone();
        let mut report = AppReport {
            app_name: name.clone(),
            bundle_path: self.format.bundle_path(&self.env.base_path, &app),
            failure: None,
            checksum: None,
        };

        let result = gate::finalize_app_config(&mut app, self.env);
        self.record(summary, Stage::FinalizeAppConfig, Some(&name), &result);
        if let Err(e) = result {
            report.failure = Some((Stage::FinalizeAppConfig, e.to_string()));
            return report;
        }

        let stage = AppStage::new(&app, self.env, self.format);
        let format = self.format;
        for &step in APP_STAGES {
            let result = match step {
                Stage::VerifyAppTemplate => format.verify_app_template(&stage).await,
                Stage::VerifyAppTools => format.verify_app_tools(&stage).await,
                Stage::GenerateAppTemplate => format.generate_app_template(&stage).await,
                Stage::InstallAppSupportPackage => format.install_app_support_package(&stage).await,
                Stage::InstallAppRequirements => format.install_app_requirements(&stage).await,
                Stage::InstallAppCode => format.install_app_code(&stage).await,
                Stage::InstallAppResources => format.install_app_resources(&stage).await,
                Stage::InstallStubBinary if format.uses_stub_binary() => {
                    format.install_stub_binary(&stage).await
                }
                Stage::InstallStubBinary => continue,
                Stage::CleanupAppContent => format.cleanup_app_content(&stage).await,
                Stage::VerifyHost | Stage::VerifyTools | Stage::FinalizeAppConfig => continue,
            };

            self.record(summary, step, Some(&name), &result);
            if let Err(e) = result {
                report.failure = Some((step, e.to_string()));
                return report;
            }
        }

        report.checksum = match calculate_sha256(&stage.bundle_dir).await {
            Ok(checksum) => Some(checksum),
            Err(e) => {
                log::warn!("Unable to checksum {}: {}", stage.bundle_dir.display(), e);
                None
            }
        };
        log::info!("✓ Created {} bundle for {}", format.description(), name);
        report
    }

    fn record(
        &self,
        summary: &mut RunSummary,
        stage: Stage,
        app: Option<&str>,
        result: &Result<Progress>,
    ) {
        let outcome = match result {
            Ok(Progress::Done) => Outcome::Completed,
            Ok(Progress::Skipped(reason)) => Outcome::Skipped(reason.clone()),
            Err(e) => Outcome::Failed(e.to_string()),
        };
        let record = ActionRecord::new(stage, app, outcome);
        self.reporter.action(&record);
        summary.actions.push(record);
    }
}
