//! Per-app configuration.

use serde::Deserialize;
use std::collections::BTreeMap;

/// License descriptor, either a license file or inline text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum License {
    /// Path to a license file, relative to the project root.
    File(String),
    /// Inline license text or SPDX expression.
    Text(String),
}

impl Default for License {
    fn default() -> Self {
        Self::File("LICENSE".into())
    }
}

/// Configuration for one app in a project.
///
/// Built from the merged project configuration (see [`crate::metadata`]) and
/// treated as immutable once the pipeline starts for the app. The only field
/// written after loading is the runtime version tag, set once by
/// [`AppConfig::finalize`].
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Filesystem-safe identifier, unique within the project.
    pub app_name: String,

    /// Human-readable name. Defaults to `app_name`.
    #[serde(default)]
    pub formal_name: Option<String>,

    /// Reverse-DNS prefix, e.g. `com.example`.
    pub bundle: String,

    /// Canonical version string.
    pub version: String,

    /// One line description.
    pub description: String,

    /// Source directories or files, relative to the project root.
    #[serde(default)]
    pub sources: Vec<String>,

    /// Test-only sources, installed in test mode.
    #[serde(default)]
    pub test_sources: Vec<String>,

    /// Third-party requirements.
    #[serde(default)]
    pub requires: Vec<String>,

    /// Test-only requirements, installed in test mode.
    #[serde(default)]
    pub test_requires: Vec<String>,

    /// Extra arguments passed to the requirement installer.
    #[serde(default)]
    pub requirement_installer_args: Vec<String>,

    /// License descriptor.
    #[serde(default)]
    pub license: License,

    /// Project homepage.
    #[serde(default)]
    pub url: Option<String>,

    /// Author name.
    #[serde(default)]
    pub author: Option<String>,

    /// Author email.
    #[serde(default)]
    pub author_email: Option<String>,

    /// Permission name → justification.
    ///
    /// Holds both cross-platform permissions (`camera`, `microphone`, ...)
    /// and platform-specific keys, which are passed through verbatim.
    #[serde(default)]
    pub permission: BTreeMap<String, String>,

    /// Raw platform-specific capability requests.
    #[serde(default)]
    pub request: BTreeMap<String, serde_json::Value>,

    /// Icon path prefix, without size suffix or extension.
    #[serde(default)]
    pub icon: Option<String>,

    /// Splash image path prefix, without size suffix or extension.
    #[serde(default)]
    pub splash: Option<String>,

    /// Template source override (local path, `org/repo`, or git URL).
    #[serde(default)]
    pub template: Option<String>,

    /// Template branch override.
    #[serde(default)]
    pub template_branch: Option<String>,

    /// Custom support package (local archive or URL).
    #[serde(default)]
    pub support_package: Option<String>,

    /// Requested support package revision.
    #[serde(default)]
    pub support_revision: Option<u64>,

    /// Expected SHA-256 of the support package archive.
    #[serde(default)]
    pub support_package_sha256: Option<String>,

    /// Requested stub binary revision.
    #[serde(default)]
    pub stub_binary_revision: Option<u64>,

    /// Extra glob patterns removed by the cleanup stage.
    #[serde(default)]
    pub cleanup_paths: Vec<String>,

    /// Whether the app runs as a console program.
    #[serde(default)]
    pub console_app: bool,

    /// Whether test sources and requirements are installed.
    #[serde(default)]
    pub test_mode: bool,

    /// Runtime version tag (e.g. "3.12"); filled in by [`AppConfig::finalize`]
    /// when not configured.
    #[serde(default)]
    pub runtime_version_tag: Option<String>,

    #[serde(skip)]
    finalized: bool,
}

impl AppConfig {
    /// Human-readable name.
    pub fn formal_name(&self) -> &str {
        self.formal_name.as_deref().unwrap_or(&self.app_name)
    }

    /// Importable module name: `app_name` with `-` replaced by `_`.
    pub fn module_name(&self) -> String {
        self.app_name.replace('-', "_")
    }

    /// Bundle name: `app_name` with `_` replaced by `-`.
    pub fn bundle_name(&self) -> String {
        self.app_name.replace('_', "-")
    }

    /// Fully qualified bundle identifier, e.g. `com.example.my-app`.
    pub fn bundle_identifier(&self) -> String {
        format!("{}.{}", self.bundle, self.bundle_name())
    }

    /// `bundle` made usable as a namespace identifier.
    pub fn package_name(&self) -> String {
        self.bundle.replace('-', "_")
    }

    /// Class name derived from the formal name.
    ///
    /// Keeps alphanumeric characters and `_`; prefixes `_` if the result
    /// starts with a digit.
    pub fn class_name(&self) -> String {
        let mut name: String = self
            .formal_name()
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if name.chars().next().is_some_and(|c| c.is_numeric()) {
            name.insert(0, '_');
        }
        name
    }

    /// Sources to install; test sources are appended in test mode.
    pub fn all_sources(&self) -> Vec<String> {
        let mut sources = self.sources.clone();
        if self.test_mode {
            sources.extend(self.test_sources.iter().cloned());
        }
        sources
    }

    /// Requirements to install; test requirements are appended in test mode.
    ///
    /// The two sets may overlap, so exact duplicates are dropped while
    /// preserving first-seen order.
    pub fn all_requires(&self) -> Vec<String> {
        let mut requires: Vec<String> = Vec::new();
        let test = if self.test_mode {
            self.test_requires.as_slice()
        } else {
            &[]
        };
        for requirement in self.requires.iter().chain(test) {
            if !requires.contains(requirement) {
                requires.push(requirement.clone());
            }
        }
        requires
    }

    /// Entry module; prefixed with `tests.` in test mode.
    pub fn main_module(&self) -> String {
        if self.test_mode {
            format!("tests.{}", self.module_name())
        } else {
            self.module_name()
        }
    }

    /// Whether [`AppConfig::finalize`] has run.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Resolve tool-dependent defaults.
    ///
    /// Returns `false` (and changes nothing) if the app was already finalized.
    pub fn finalize(&mut self, runtime_version_tag: Option<String>) -> bool {
        if self.finalized {
            return false;
        }
        if self.runtime_version_tag.is_none() {
            self.runtime_version_tag = runtime_version_tag;
        }
        self.finalized = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(name: &str) -> AppConfig {
        toml::from_str(&format!(
            r#"
            app_name = "{name}"
            formal_name = "2nd Best App!"
            bundle = "com.ex-ample"
            version = "1.2.3"
            description = "An app"
            sources = ["src/{module}"]
            test_sources = ["tests"]
            requires = ["a", "b"]
            test_requires = ["b", "pytest"]
            "#,
            module = name.replace('-', "_")
        ))
        .unwrap()
    }

    #[test]
    fn derived_names() {
        let app = app("my-app_2");
        assert_eq!(app.module_name(), "my_app_2");
        assert_eq!(app.bundle_name(), "my-app-2");
        assert_eq!(app.bundle_identifier(), "com.ex-ample.my-app-2");
        assert_eq!(app.package_name(), "com.ex_ample");
        assert_eq!(app.class_name(), "_2ndBestApp");
    }

    #[test]
    fn test_mode_extends_sources_and_requires() {
        let mut app = app("first");
        assert_eq!(app.all_sources(), vec!["src/first"]);
        assert_eq!(app.all_requires(), vec!["a", "b"]);
        assert_eq!(app.main_module(), "first");

        app.test_mode = true;
        assert_eq!(app.all_sources(), vec!["src/first", "tests"]);
        assert_eq!(app.all_requires(), vec!["a", "b", "pytest"]);
        assert_eq!(app.main_module(), "tests.first");
    }

    #[test]
    fn finalize_runs_once() {
        let mut app = app("first");
        assert!(app.finalize(Some("3.12".into())));
        assert!(!app.finalize(Some("3.13".into())));
        assert_eq!(app.runtime_version_tag.as_deref(), Some("3.12"));
        assert!(app.is_finalized());
    }
}
