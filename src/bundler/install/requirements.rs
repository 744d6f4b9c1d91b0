//! Third-party requirement installation.
//!
//! The template decides how requirements reach the bundle:
//!
//! - `app_requirements_path` in the index: write a requirements file (and
//!   optionally an installer arguments file) for the build step to consume;
//! - otherwise: run the runtime's package installer into `app_packages_path`.

use crate::bundler::{
    error::{Error, ErrorExt, Result},
    index::{IndexKey, PathIndex},
    platform::Progress,
    settings::AppConfig,
    utils::{Subprocess, fs, process::display_command},
};
use path_absolutize::Absolutize;
use std::path::Path;

/// Default requirement install target when neither index nor layout names one.
pub const DEFAULT_APP_PACKAGES_PATH: &str = "app_packages";

/// Runs the requirement installer.
pub struct RequirementInstaller<'a> {
    subprocess: &'a dyn Subprocess,
    runtime: &'a str,
    base_path: &'a Path,
}

impl<'a> RequirementInstaller<'a> {
    /// Creates an installer invoking `<runtime> -m pip` from `base_path`.
    pub fn new(subprocess: &'a dyn Subprocess, runtime: &'a str, base_path: &'a Path) -> Self {
        Self {
            subprocess,
            runtime,
            base_path,
        }
    }

    /// Installs the app's requirements (test requirements too in test mode).
    ///
    /// `default_packages_path` is recorded in the index when the template
    /// did not declare `app_packages_path`.
    pub async fn install(
        &self,
        app: &AppConfig,
        bundle_dir: &Path,
        default_packages_path: Option<&str>,
    ) -> Result<Progress> {
        let index = PathIndex::load_required(bundle_dir).await?;
        let requires = self.resolve_requires(&app.all_requires());

        if let Some(requirements_path) = index.app_requirements_path()? {
            write_lines(&requirements_path, &requires).await?;
            if let Some(args_path) = index.app_requirement_installer_args_path()? {
                write_lines(&args_path, &app.requirement_installer_args).await?;
            }
            log::info!("✓ Wrote requirements to {}", requirements_path.display());
            return Ok(Progress::Done);
        }

        let packages_path = match index.app_packages_path()? {
            Some(path) => path,
            None => {
                let relative = default_packages_path.unwrap_or(DEFAULT_APP_PACKAGES_PATH);
                log::debug!("No app_packages_path in index; using {}", relative);
                PathIndex::update(bundle_dir, |index| {
                    index.set_path(IndexKey::AppPackagesPath, relative);
                    Ok(())
                })
                .await?;
                bundle_dir.join(relative)
            }
        };

        let had_packages = has_entries(&packages_path).await;
        fs::create_dir_all(&packages_path, true).await?;

        if requires.is_empty() {
            if had_packages {
                log::info!("✓ Removed previously installed requirements for {}", app.app_name);
                return Ok(Progress::Done);
            }
            log::info!("No requirements to install for {}", app.app_name);
            return Ok(Progress::Skipped("no requirements".into()));
        }

        let mut args = vec![
            "-m".to_string(),
            "pip".to_string(),
            "install".to_string(),
            "--upgrade".to_string(),
            "--no-user".to_string(),
            "--target".to_string(),
            packages_path.to_string_lossy().into_owned(),
        ];
        args.extend(app.requirement_installer_args.iter().cloned());
        args.extend(requires);

        log::info!("Installing requirements for {}", app.app_name);
        let output = self
            .subprocess
            .run(self.runtime, &args, Some(self.base_path))
            .await
            .map_err(|e| Error::RequirementsInstall {
                app: app.app_name.clone(),
                reason: e.to_string(),
            })?;
        if !output.success() {
            return Err(Error::RequirementsInstall {
                app: app.app_name.clone(),
                reason: format!(
                    "`{}` exited with {:?}: {}",
                    display_command(self.runtime, &args),
                    output.exit_code,
                    output.stderr.trim()
                ),
            });
        }

        log::info!("✓ Installed requirements into {}", packages_path.display());
        Ok(Progress::Done)
    }

    /// Makes local path requirements absolute so they survive a change of
    /// working directory.
    pub fn resolve_requires(&self, requires: &[String]) -> Vec<String> {
        requires
            .iter()
            .map(|requirement| {
                if is_local_requirement(requirement) {
                    let path = Path::new(requirement);
                    match path.absolutize_from(self.base_path) {
                        Ok(absolute) => absolute.to_string_lossy().into_owned(),
                        Err(_) => requirement.clone(),
                    }
                } else {
                    requirement.clone()
                }
            })
            .collect()
    }
}

fn is_local_requirement(requirement: &str) -> bool {
    requirement.starts_with("./")
        || requirement.starts_with("../")
        || requirement.starts_with('/')
        || requirement.starts_with(".\\")
        || requirement.starts_with("..\\")
}

async fn has_entries(dir: &Path) -> bool {
    match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(Some(_))),
        Err(_) => false,
    }
}

async fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent, false).await?;
    }
    let mut content = lines.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    tokio::fs::write(path, content)
        .await
        .fs_context("writing", path)
}
