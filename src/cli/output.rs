//! Terminal output.
//!
//! Plain lines on stdout, warnings and errors on stderr. The manager also
//! acts as the pipeline's [`Reporter`], printing one line per stage.

use crate::bundler::{ActionRecord, Outcome, Reporter, RunStatus, RunSummary};
use std::io::{self, Write};

/// Prints progress and results for a run.
#[derive(Debug, Clone, Copy)]
pub struct OutputManager {
    verbose: bool,
    quiet: bool,
}

impl OutputManager {
    /// Creates a manager. `quiet` suppresses everything except errors.
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    /// Print a message only in verbose mode.
    pub fn verbose(&self, message: &str) -> io::Result<()> {
        if self.verbose && !self.quiet {
            writeln!(io::stdout(), "{message}")?;
        }
        Ok(())
    }

    pub fn progress(&self, message: &str) -> io::Result<()> {
        if !self.quiet {
            writeln!(io::stdout(), "{message}")?;
        }
        Ok(())
    }

    pub fn success(&self, message: &str) -> io::Result<()> {
        if !self.quiet {
            writeln!(io::stdout(), "✓ {message}")?;
        }
        Ok(())
    }

    pub fn warn(&self, message: &str) -> io::Result<()> {
        if !self.quiet {
            writeln!(io::stderr(), "⚠ {message}")?;
        }
        Ok(())
    }

    /// Errors are printed even in quiet mode.
    pub fn error(&self, message: &str) -> io::Result<()> {
        writeln!(io::stderr(), "✗ {message}")
    }

    /// Print a section header
    pub fn section(&self, title: &str) -> io::Result<()> {
        if !self.quiet {
            let mut out = io::stdout();
            writeln!(out)?;
            writeln!(out, "[{title}]")?;
        }
        Ok(())
    }

    /// Print indented text
    pub fn indent(&self, message: &str) -> io::Result<()> {
        if !self.quiet {
            writeln!(io::stdout(), "  {message}")?;
        }
        Ok(())
    }
}

impl Reporter for OutputManager {
    fn action(&self, record: &ActionRecord) {
        let line = match &record.app {
            Some(app) => format!("{} ({})", record.stage, app),
            None => record.stage.to_string(),
        };
        // A closed terminal is not worth failing the run over.
        let _ = match &record.outcome {
            Outcome::Completed => self.indent(&format!("{line}: done")),
            Outcome::Skipped(reason) => self.verbose(&format!("  {line}: skipped ({reason})")),
            Outcome::Failed(error) => self.error(&format!("{line}: {error}")),
        };
    }

    fn finished(&self, summary: &RunSummary) {
        let _ = self.section("Summary");
        for app in &summary.apps {
            let _ = match &app.failure {
                None => self.success(&format!("{} -> {}", app.app_name, app.bundle_path.display())),
                Some((stage, error)) => {
                    self.error(&format!("{} failed during {}: {}", app.app_name, stage, error))
                }
            };
            if let Some(checksum) = &app.checksum {
                let _ = self.verbose(&format!("  sha256 {checksum}"));
            }
        }
        let _ = match summary.status() {
            RunStatus::Success => self.success("All apps created"),
            RunStatus::Mixed => self.warn("Some apps failed"),
            RunStatus::Failed => self.error("No apps were created"),
        };
    }
}
