//! Subprocess execution.
//!
//! Stages never spawn processes directly; they go through [`Subprocess`] so
//! tool probes and requirement installs can be scripted in tests.

use crate::bundler::error::{Error, Result};
use std::{path::Path, process::Stdio, time::Duration};
use tokio::process::Command;
use tokio::time::timeout;

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Captured stdout (lossy UTF-8).
    pub stdout: String,
    /// Captured stderr (lossy UTF-8).
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external commands.
#[async_trait::async_trait]
pub trait Subprocess: Send + Sync {
    /// Runs `program` with `args`, optionally in `cwd`, and captures its output.
    ///
    /// A non-zero exit is not an error; callers inspect [`CommandOutput`].
    async fn run(&self, program: &str, args: &[String], cwd: Option<&Path>) -> Result<CommandOutput>;
}

/// [`Subprocess`] backed by `tokio::process` with a per-command timeout.
#[derive(Debug, Clone)]
pub struct TokioSubprocess {
    timeout: Duration,
}

impl TokioSubprocess {
    /// Creates a runner that kills commands running longer than `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait::async_trait]
impl Subprocess for TokioSubprocess {
    async fn run(&self, program: &str, args: &[String], cwd: Option<&Path>) -> Result<CommandOutput> {
        let command_line = display_command(program, args);
        log::debug!("Running: {}", command_line);

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        let child = command.spawn().map_err(|error| Error::CommandFailed {
            command: command_line.clone(),
            error,
        })?;

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Err(_) => {
                return Err(Error::Timeout {
                    command: command_line,
                    seconds: self.timeout.as_secs(),
                });
            }
            Ok(result) => result.map_err(|error| Error::CommandFailed {
                command: command_line.clone(),
                error,
            })?,
        };

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Formats a command line for logs and error messages.
pub fn display_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}
