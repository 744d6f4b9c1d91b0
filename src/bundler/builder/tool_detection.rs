//! External tool detection and availability checking.
//!
//! Tools are probed lazily and the result is cached in a [`ToolCache`] that
//! lives for one run and is passed by reference to whoever needs it. Each
//! tool is probed at most once, even when several apps ask concurrently.

use crate::bundler::{
    error::{Error, Result},
    utils::Subprocess,
};
use regex::Regex;
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, LazyLock, Mutex},
};
use tokio::sync::OnceCell;

/// Availability probe for an external tool.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (usually the executable name).
    fn name(&self) -> &str;

    /// Whether the tool can be run on this host.
    async fn is_available(&self) -> bool;

    /// Version string reported by the tool, if it reports one.
    async fn version(&self) -> Option<String>;

    /// Resolved location, if known.
    fn location(&self) -> Option<PathBuf> {
        None
    }
}

/// Builds [`Tool`] probes by name.
pub trait ToolProvider: Send + Sync {
    /// Returns a probe for `name`.
    fn tool(&self, name: &str) -> Box<dyn Tool>;
}

/// A tool the format or app needs, with an optional minimum version.
#[derive(Debug, Clone)]
pub struct ToolRequirement {
    /// Tool name.
    pub name: String,
    /// Version requirement the tool must satisfy.
    pub version: Option<semver::VersionReq>,
    /// Install hint shown when the tool is missing.
    pub hint: Option<String>,
}

impl ToolRequirement {
    /// Requires the tool to be present, any version.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            hint: None,
        }
    }

    /// Adds a minimum version (e.g. `">=2.17"`). Unparseable requirements are ignored.
    pub fn with_version(mut self, requirement: &str) -> Self {
        match semver::VersionReq::parse(requirement) {
            Ok(req) => self.version = Some(req),
            Err(e) => log::warn!("Ignoring invalid version requirement {}: {}", requirement, e),
        }
        self
    }

    /// Adds an install hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Result of probing a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedTool {
    /// Tool name.
    pub name: String,
    /// Resolved location, if the probe knows it.
    pub location: Option<PathBuf>,
    /// Raw version string.
    pub version: Option<String>,
}

impl VerifiedTool {
    /// Parsed `major.minor[.patch]` version, if the version string contains one.
    pub fn semver(&self) -> Option<semver::Version> {
        self.version.as_deref().and_then(parse_version)
    }

    /// `major.minor` tag (e.g. "3.12") derived from the version.
    pub fn version_tag(&self) -> Option<String> {
        self.semver().map(|v| format!("{}.{}", v.major, v.minor))
    }
}

/// Run-scoped cache of verified tools.
pub struct ToolCache {
    provider: Arc<dyn ToolProvider>,
    entries: Mutex<HashMap<String, Arc<OnceCell<VerifiedTool>>>>,
}

impl std::fmt::Debug for ToolCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCache")
            .field("verified", &self.verified_names())
            .finish()
    }
}

impl ToolCache {
    /// Creates an empty cache that probes tools through `provider`.
    pub fn new(provider: Arc<dyn ToolProvider>) -> Self {
        Self {
            provider,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Verifies a tool, probing it only if no earlier call succeeded.
    ///
    /// # Errors
    ///
    /// [`Error::MissingTool`] if the tool is absent, reports no version when
    /// one is required, or does not satisfy the version requirement.
    pub async fn verify(&self, requirement: &ToolRequirement) -> Result<VerifiedTool> {
        let cell = {
            let mut entries = self
                .entries
                .lock()
                .map_err(|_| Error::GenericError("tool cache lock poisoned".into()))?;
            entries.entry(requirement.name.clone()).or_default().clone()
        };

        let verified = cell
            .get_or_try_init(|| self.probe(requirement))
            .await?
            .clone();

        if let Some(req) = &requirement.version {
            let Some(version) = verified.semver() else {
                return Err(self.missing(requirement, "unable to determine its version".into()));
            };
            if !req.matches(&version) {
                return Err(self.missing(
                    requirement,
                    format!("found version {}, but {} is required", version, req),
                ));
            }
        }

        Ok(verified)
    }

    /// Returns an already verified tool without probing.
    pub fn get(&self, name: &str) -> Option<VerifiedTool> {
        let entries = self.entries.lock().ok()?;
        entries.get(name).and_then(|cell| cell.get().cloned())
    }

    /// Names of all tools verified so far.
    pub fn verified_names(&self) -> Vec<String> {
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    async fn probe(&self, requirement: &ToolRequirement) -> Result<VerifiedTool> {
        let tool = self.provider.tool(&requirement.name);
        if !tool.is_available().await {
            log::debug!("{} not found", requirement.name);
            return Err(self.missing(requirement, "not found".into()));
        }

        let version = tool.version().await;
        match &version {
            Some(version) => log::info!("✓ {} available: {}", requirement.name, version),
            None => log::info!("✓ {} available", requirement.name),
        }

        Ok(VerifiedTool {
            name: requirement.name.clone(),
            location: tool.location(),
            version,
        })
    }

    fn missing(&self, requirement: &ToolRequirement, reason: String) -> Error {
        let reason = match &requirement.hint {
            Some(hint) => format!("{reason}. {hint}"),
            None => reason,
        };
        Error::MissingTool {
            tool: requirement.name.clone(),
            reason,
        }
    }
}

/// Tool found on `PATH` and asked for its version with `--version`.
pub struct SystemTool {
    name: String,
    location: Option<PathBuf>,
    subprocess: Arc<dyn Subprocess>,
}

#[async_trait::async_trait]
impl Tool for SystemTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        self.location.is_some()
    }

    async fn version(&self) -> Option<String> {
        let location = self.location.as_ref()?.to_string_lossy().into_owned();
        match self
            .subprocess
            .run(&location, &["--version".to_string()], None)
            .await
        {
            Ok(output) if output.success() => {
                // Some tools (older runtimes) print their version on stderr.
                let text = if output.stdout.trim().is_empty() {
                    output.stderr
                } else {
                    output.stdout
                };
                text.lines().next().map(|line| line.trim().to_string())
            }
            Ok(output) => {
                log::warn!(
                    "{} found at {} but --version failed (exit code: {:?}). Stderr: {}",
                    self.name,
                    location,
                    output.exit_code,
                    output.stderr.trim()
                );
                None
            }
            Err(e) => {
                log::warn!("{} found at {} but failed to execute: {}", self.name, location, e);
                None
            }
        }
    }

    fn location(&self) -> Option<PathBuf> {
        self.location.clone()
    }
}

/// [`ToolProvider`] that looks tools up on `PATH`.
pub struct SystemToolProvider {
    subprocess: Arc<dyn Subprocess>,
}

impl SystemToolProvider {
    /// Creates a provider whose version probes run through `subprocess`.
    pub fn new(subprocess: Arc<dyn Subprocess>) -> Self {
        Self { subprocess }
    }
}

impl ToolProvider for SystemToolProvider {
    fn tool(&self, name: &str) -> Box<dyn Tool> {
        let location = match which::which(name) {
            Ok(path) => {
                log::debug!("Found {} at: {}", name, path.display());
                Some(path)
            }
            Err(e) => {
                log::debug!("{} not found in PATH: {}", name, e);
                None
            }
        };
        Box::new(SystemTool {
            name: name.to_string(),
            location,
            subprocess: self.subprocess.clone(),
        })
    }
}

static VERSION_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").ok());

/// Extracts the first `major.minor[.patch]` from free-form version output.
///
/// `"git version 2.39.3 (Apple Git-145)"` parses as `2.39.3`;
/// `"Python 3.12"` as `3.12.0`.
pub fn parse_version(text: &str) -> Option<semver::Version> {
    let captures = VERSION_RE.as_ref()?.captures(text)?;
    let part = |i: usize| -> Option<u64> {
        captures
            .get(i)
            .map_or(Some(0), |m| m.as_str().parse().ok())
    };
    Some(semver::Version::new(part(1)?, part(2)?, part(3)?))
}
