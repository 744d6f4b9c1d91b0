//! Output formats.
//!
//! Each format (macOS app, Windows app, Linux AppImage) implements
//! [`OutputFormat`]: what hosts and tools it needs, where its bundle and
//! binary live, what it adds to the template context, how it spells
//! permissions, and which prebuilt artifacts it uses. The pipeline only ever
//! holds a `&dyn OutputFormat`.
//!
//! Every pipeline stage is also a trait method with a default
//! implementation, so a format can replace a single stage without touching
//! the ordering or gating around it.

pub mod linux;
pub mod macos;
pub mod windows;

use crate::bundler::{
    builder::{PipelineEnv, ToolRequirement, gate, stages},
    error::Result,
    index::BundleLayout,
    install::ResourceCopy,
    permissions::{PermissionRules, PermissionSet},
    settings::{AppConfig, HostEnvironment},
    stub::executable_name,
    template::ResolvedTemplate,
    utils::ArchiveFormat,
};
use serde_json::{Map, Value, json};
use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

/// Files removed from every bundle by the cleanup stage.
pub const DEFAULT_CLEANUP_PATHS: &[&str] = &[
    "**/__pycache__",
    "**/*.dist-info/direct_url.json",
    "**/*.dist-info/RECORD",
];

/// What a stage did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// The stage changed the bundle.
    Done,
    /// The stage had nothing to do.
    Skipped(String),
}

/// Everything a stage needs to work on one app.
pub struct AppStage<'a> {
    /// Finalized app configuration.
    pub app: &'a AppConfig,
    /// Bundle directory for this app and format.
    pub bundle_dir: PathBuf,
    /// Run-wide collaborators and options.
    pub env: &'a PipelineEnv,
    /// Active output format.
    pub format: &'a dyn OutputFormat,
    /// Template resolved by the verification gate.
    pub template: OnceLock<ResolvedTemplate>,
}

impl<'a> AppStage<'a> {
    /// Creates the stage state for one app.
    pub fn new(app: &'a AppConfig, env: &'a PipelineEnv, format: &'a dyn OutputFormat) -> Self {
        Self {
            bundle_dir: format.bundle_path(&env.base_path, app),
            app,
            env,
            format,
            template: OnceLock::new(),
        }
    }
}

/// A platform-native bundle format.
#[async_trait::async_trait]
pub trait OutputFormat: Send + Sync {
    /// Platform name, e.g. `macOS`.
    fn platform(&self) -> &str;

    /// Format name within the platform, e.g. `app`.
    fn output_format(&self) -> &str;

    /// Human-readable label.
    fn description(&self) -> String {
        format!("{} {}", self.platform(), self.output_format())
    }

    /// Host OS identifiers this format can be created on.
    fn supported_host_os(&self) -> &[&str];

    /// Tools the whole run needs.
    fn required_tools(&self) -> Vec<ToolRequirement> {
        Vec::new()
    }

    /// Tools one app needs beyond [`required_tools`](Self::required_tools).
    fn app_tools(&self, _app: &AppConfig) -> Vec<ToolRequirement> {
        Vec::new()
    }

    /// Repository name of the default template, relative to the template registry.
    fn default_template(&self) -> String {
        format!(
            "{}-{}-template",
            self.platform().to_lowercase(),
            self.output_format().to_lowercase()
        )
    }

    /// Bundle directory: `<base>/build/<app_name>/<platform>/<format>`.
    fn bundle_path(&self, base_path: &Path, app: &AppConfig) -> PathBuf {
        base_path
            .join("build")
            .join(&app.app_name)
            .join(self.platform().to_lowercase())
            .join(self.output_format().to_lowercase())
    }

    /// Where the format's template places things.
    fn bundle_layout(&self, app: &AppConfig) -> BundleLayout;

    /// Path of the final executable inside the bundle.
    fn binary_path(&self, app: &AppConfig, bundle_dir: &Path, host: &HostEnvironment) -> PathBuf;

    /// Format-specific template context.
    fn template_context(&self, _app: &AppConfig, _host: &HostEnvironment) -> Map<String, Value> {
        Map::new()
    }

    /// How the format spells permissions; `None` means it has none.
    fn permission_rules(&self) -> Option<&dyn PermissionRules> {
        None
    }

    /// Context keys produced from the app's permissions.
    fn permissions_context(&self, _app: &AppConfig, permissions: &PermissionSet) -> Map<String, Value> {
        let mut context = Map::new();
        context.insert("permissions".into(), json!(permissions.permissions));
        context.insert("requests".into(), json!(permissions.requests));
        context
    }

    /// Whether the format ships a prebuilt support package.
    fn uses_support_package(&self) -> bool {
        true
    }

    /// Support package revision installed when the app does not pin one.
    fn support_revision(&self) -> Option<u64> {
        None
    }

    /// Archive format served by the support registry.
    fn support_archive_format(&self) -> ArchiveFormat {
        ArchiveFormat::TarGz
    }

    /// Whether the executable is a prebuilt stub rather than compiled.
    fn uses_stub_binary(&self) -> bool {
        false
    }

    /// Stub binary revision installed when the app does not pin one.
    fn stub_binary_revision(&self) -> Option<u64> {
        None
    }

    /// File name of the stub inside the stub archive.
    fn stub_name(&self, app: &AppConfig, host: &HostEnvironment) -> String {
        let stub = if app.console_app { "Console-Stub" } else { "GUI-Stub" };
        executable_name(stub, host)
    }

    /// Auxiliary files (icons, splash) to copy into the bundle.
    fn resources(&self, _app: &AppConfig, _bundle_dir: &Path) -> Vec<ResourceCopy> {
        Vec::new()
    }

    /// Bundle-relative globs removed by the cleanup stage.
    fn cleanup_paths(&self, app: &AppConfig) -> Vec<String> {
        DEFAULT_CLEANUP_PATHS
            .iter()
            .map(|p| p.to_string())
            .chain(app.cleanup_paths.iter().cloned())
            .collect()
    }

    async fn verify_app_template(&self, stage: &AppStage<'_>) -> Result<Progress> {
        gate::verify_app_template(stage).await
    }

    async fn verify_app_tools(&self, stage: &AppStage<'_>) -> Result<Progress> {
        gate::verify_app_tools(stage).await
    }

    async fn generate_app_template(&self, stage: &AppStage<'_>) -> Result<Progress> {
        stages::generate_app_template(stage).await
    }

    async fn install_app_support_package(&self, stage: &AppStage<'_>) -> Result<Progress> {
        stages::install_app_support_package(stage).await
    }

    async fn install_app_requirements(&self, stage: &AppStage<'_>) -> Result<Progress> {
        stages::install_app_requirements(stage).await
    }

    async fn install_app_code(&self, stage: &AppStage<'_>) -> Result<Progress> {
        stages::install_app_code(stage).await
    }

    async fn install_app_resources(&self, stage: &AppStage<'_>) -> Result<Progress> {
        stages::install_app_resources(stage).await
    }

    async fn install_stub_binary(&self, stage: &AppStage<'_>) -> Result<Progress> {
        stages::install_stub_binary(stage).await
    }

    async fn cleanup_app_content(&self, stage: &AppStage<'_>) -> Result<Progress> {
        stages::cleanup_app_content(stage).await
    }
}

/// Known `(platform, format)` pairs.
pub const FORMATS: &[(&str, &str)] = &[("macOS", "app"), ("windows", "app"), ("linux", "appimage")];

/// Looks up a shipped output format (case-insensitive).
pub fn lookup(platform: &str, format: &str) -> Option<Box<dyn OutputFormat>> {
    match (platform.to_lowercase().as_str(), format.to_lowercase().as_str()) {
        ("macos", "app") => Some(Box::new(macos::MacOsApp)),
        ("windows", "app") => Some(Box::new(windows::WindowsApp)),
        ("linux", "appimage") => Some(Box::new(linux::AppImage)),
        _ => None,
    }
}

/// Platform name for the running host.
pub fn host_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "macOS"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else {
        "linux"
    }
}

/// Default format for a platform.
pub fn default_format(platform: &str) -> Option<&'static str> {
    FORMATS
        .iter()
        .find(|(p, _)| p.eq_ignore_ascii_case(platform))
        .map(|(_, f)| *f)
}
