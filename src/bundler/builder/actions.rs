//! Action records and run summaries.
//!
//! Every stage the pipeline runs produces an [`ActionRecord`], in order, and
//! hands it to the [`Reporter`]. The records are also kept in the
//! [`RunSummary`] returned to the caller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    VerifyHost,
    VerifyTools,
    FinalizeAppConfig,
    VerifyAppTemplate,
    VerifyAppTools,
    GenerateAppTemplate,
    InstallAppSupportPackage,
    InstallAppRequirements,
    InstallAppCode,
    InstallAppResources,
    InstallStubBinary,
    CleanupAppContent,
}

impl Stage {
    /// Stage name as shown in records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VerifyHost => "verify_host",
            Self::VerifyTools => "verify_tools",
            Self::FinalizeAppConfig => "finalize_app_config",
            Self::VerifyAppTemplate => "verify_app_template",
            Self::VerifyAppTools => "verify_app_tools",
            Self::GenerateAppTemplate => "generate_app_template",
            Self::InstallAppSupportPackage => "install_app_support_package",
            Self::InstallAppRequirements => "install_app_requirements",
            Self::InstallAppCode => "install_app_code",
            Self::InstallAppResources => "install_app_resources",
            Self::InstallStubBinary => "install_stub_binary",
            Self::CleanupAppContent => "cleanup_app_content",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stage ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    Skipped(String),
    Failed(String),
}

impl Outcome {
    /// Whether the stage failed.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// One executed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRecord {
    pub stage: Stage,
    /// App the stage ran for; `None` for run-wide stages.
    pub app: Option<String>,
    pub outcome: Outcome,
    pub at: DateTime<Utc>,
}

impl ActionRecord {
    /// Records a stage ending now.
    pub fn new(stage: Stage, app: Option<&str>, outcome: Outcome) -> Self {
        Self {
            stage,
            app: app.map(String::from),
            outcome,
            at: Utc::now(),
        }
    }
}

/// Result of one app's pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppReport {
    pub app_name: String,
    pub bundle_path: PathBuf,
    /// Stage that failed and its error, if any.
    pub failure: Option<(Stage, String)>,
    /// SHA-256 of the finished bundle tree.
    pub checksum: Option<String>,
}

impl AppReport {
    /// Whether every stage completed or skipped.
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every app completed.
    Success,
    /// Some apps completed, some failed.
    Mixed,
    /// No app completed.
    Failed,
}

impl RunStatus {
    /// Process exit code for this status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Mixed | Self::Failed => 1,
        }
    }
}

/// Everything a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub actions: Vec<ActionRecord>,
    pub apps: Vec<AppReport>,
}

impl RunSummary {
    /// Success only if every app succeeded; failed if none did.
    pub fn status(&self) -> RunStatus {
        let succeeded = self.apps.iter().filter(|a| a.succeeded()).count();
        if succeeded == self.apps.len() {
            RunStatus::Success
        } else if succeeded == 0 {
            RunStatus::Failed
        } else {
            RunStatus::Mixed
        }
    }

    /// Records for one app, in order.
    pub fn actions_for<'a>(&'a self, app: &'a str) -> impl Iterator<Item = &'a ActionRecord> + 'a {
        self.actions
            .iter()
            .filter(move |r| r.app.as_deref() == Some(app))
    }

    /// Report for one app.
    pub fn app(&self, app: &str) -> Option<&AppReport> {
        self.apps.iter().find(|a| a.app_name == app)
    }
}

/// Sink for pipeline progress.
pub trait Reporter: Send + Sync {
    /// Called after every stage.
    fn action(&self, record: &ActionRecord);

    /// Called once when the run finishes.
    fn finished(&self, _summary: &RunSummary) {}
}

/// [`Reporter`] that writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn action(&self, record: &ActionRecord) {
        let app = record.app.as_deref().unwrap_or("*");
        match &record.outcome {
            Outcome::Completed => log::info!("[{}] {} completed", app, record.stage),
            Outcome::Skipped(reason) => log::info!("[{}] {} skipped: {}", app, record.stage, reason),
            Outcome::Failed(error) => log::error!("[{}] {} failed: {}", app, record.stage, error),
        }
    }
}
