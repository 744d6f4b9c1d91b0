//! Command line argument parsing and validation.

use crate::bundler::platform::{self, FORMATS};
use crate::error::CliError;
use clap::Parser;
use path_absolutize::Absolutize;
use std::{path::PathBuf, time::Duration};
use url::Url;

/// Default support package and stub binary registry.
pub const DEFAULT_SUPPORT_REGISTRY: &str = "https://support.kodegen.ai/";

/// Creates platform-native app bundles from a project configuration
#[derive(Parser, Debug)]
#[command(
    name = "kodegen_bundler_create",
    version,
    about = "Creates platform-native app bundles from templates",
    long_about = "Creates a bundle directory for every app in a project: expands the format's
template, installs the runtime support package, third-party requirements, app
code, icons and the launcher stub.

Usage:
  kodegen_bundler_create
  kodegen_bundler_create --platform linux --format appimage --app first
  kodegen_bundler_create --regenerate --test

Exit code 0 = every app created; 1 = some apps failed; 2 = nothing could run."
)]
pub struct Args {
    /// Project configuration file
    #[arg(short = 'c', long, value_name = "PATH", default_value = "Bundle.toml")]
    pub config: PathBuf,

    /// Target platform: macOS, windows, linux (defaults to the host)
    #[arg(short, long, value_name = "PLATFORM")]
    pub platform: Option<String>,

    /// Output format within the platform (defaults to the platform's first format)
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Only create these apps (repeatable)
    #[arg(short, long = "app", value_name = "NAME")]
    pub apps: Vec<String>,

    /// Install test sources and requirements
    #[arg(long)]
    pub test: bool,

    /// Replace existing bundles
    #[arg(long)]
    pub regenerate: bool,

    /// Cache directory for templates and downloads
    #[arg(long, value_name = "PATH", env = "KODEGEN_BUNDLER_DATA")]
    pub data_path: Option<PathBuf>,

    /// Support package and stub binary registry
    #[arg(
        long,
        value_name = "URL",
        env = "KODEGEN_BUNDLER_SUPPORT_REGISTRY",
        default_value = DEFAULT_SUPPORT_REGISTRY
    )]
    pub support_registry: String,

    /// Organization or URL prefix default templates are cloned from
    #[arg(long, value_name = "ORG", default_value = "cyrup-ai")]
    pub template_registry: String,

    /// Runtime executable used to install requirements
    #[arg(long, value_name = "PROGRAM", default_value = "python3")]
    pub runtime: String,

    /// Timeout in seconds for each download and subprocess
    #[arg(long, value_name = "SECONDS", default_value_t = 600)]
    pub timeout: u64,

    /// Print skipped stages and checksums
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout == 0 {
            return Err("Timeout must be at least one second".to_string());
        }
        if self.runtime.trim().is_empty() {
            return Err("Runtime cannot be empty".to_string());
        }
        let registry = Url::parse(&self.support_registry)
            .map_err(|e| format!("Invalid support registry {}: {}", self.support_registry, e))?;
        if !matches!(registry.scheme(), "http" | "https" | "file") {
            return Err(format!(
                "Support registry must be an http(s) or file URL: {}",
                self.support_registry
            ));
        }
        Ok(())
    }

    /// Target platform and format, falling back to the host defaults.
    pub fn target(&self) -> Result<(String, String), CliError> {
        let platform = self
            .platform
            .clone()
            .unwrap_or_else(|| platform::host_platform().to_string());
        let format = match &self.format {
            Some(format) => format.clone(),
            None => platform::default_format(&platform)
                .map(str::to_string)
                .ok_or_else(|| unknown_format(&platform, "?"))?,
        };
        if platform::lookup(&platform, &format).is_none() {
            return Err(unknown_format(&platform, &format));
        }
        Ok((platform, format))
    }
}

fn unknown_format(platform: &str, format: &str) -> CliError {
    CliError::UnknownFormat {
        platform: platform.to_string(),
        format: format.to_string(),
        known: FORMATS
            .iter()
            .map(|(p, f)| format!("{p} {f}"))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: super::OutputManager,
    /// Project root; the directory holding the configuration file.
    pub base_path: PathBuf,
    pub data_path: PathBuf,
    pub timeout: Duration,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        let output = super::OutputManager::new(args.verbose, args.quiet);

        let config = args
            .config
            .absolutize()
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| args.config.clone());
        let base_path = config
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let data_path = args
            .data_path
            .clone()
            .or_else(|| dirs::cache_dir().map(|dir| dir.join("kodegen-bundler")))
            .unwrap_or_else(|| base_path.join(".kodegen-bundler"));
        let data_path = data_path
            .absolutize()
            .map(|p| p.into_owned())
            .unwrap_or(data_path);

        Self {
            output,
            base_path,
            data_path,
            timeout: Duration::from_secs(args.timeout),
        }
    }
}

impl RuntimeConfig {
    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_explicit_target() {
        let args = Args::parse_from(["kodegen_bundler_create", "-p", "linux", "--app", "first"]);
        assert_eq!(args.config, PathBuf::from("Bundle.toml"));
        assert_eq!(args.apps, vec!["first"]);
        assert_eq!(
            args.target().unwrap(),
            ("linux".to_string(), "appimage".to_string())
        );
        assert!(args.validate().is_ok());
    }

    #[test]
    fn unknown_format_is_rejected() {
        let args = Args::parse_from(["kodegen_bundler_create", "-p", "linux", "-f", "deb"]);
        assert!(matches!(args.target(), Err(CliError::UnknownFormat { .. })));
    }
}
