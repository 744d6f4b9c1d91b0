//! Top-level error types for the command line tool.
//!
//! Pipeline failures are [`crate::bundler::Error`]; this module wraps them
//! together with argument and configuration problems and maps each to an
//! exit code.

use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, BundlerError>;

/// Exit code for a run-fatal failure (bad arguments, bad configuration,
/// unsupported host, missing tool).
pub const EXIT_FATAL: i32 = 2;

/// Main error type for all CLI operations
#[derive(Error, Debug)]
pub enum BundlerError {
    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Pipeline errors
    #[error("{0}")]
    Bundler(#[from] crate::bundler::Error),

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// No output format is known for the requested platform and format
    #[error("Unknown output format {platform} {format}; known formats: {known}")]
    UnknownFormat {
        platform: String,
        format: String,
        known: String,
    },
}

impl BundlerError {
    /// Suggestions printed after the error message.
    pub fn recovery_suggestions(&self) -> Vec<String> {
        use crate::bundler::Error;
        match self {
            Self::Bundler(Error::HostUnsupported { supported, .. }) => {
                vec![format!("Run this command on one of: {supported}")]
            }
            Self::Bundler(Error::MissingTool { tool, .. }) => {
                vec![format!("Install `{tool}` and make sure it is on PATH")]
            }
            Self::Bundler(Error::Config(_)) => {
                vec!["Check the project configuration file".to_string()]
            }
            Self::Cli(CliError::UnknownFormat { .. }) => {
                vec!["Pass --platform and --format with a known pair".to_string()]
            }
            _ => Vec::new(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        EXIT_FATAL
    }
}
