//! Template source resolution.
//!
//! A template is either a local directory or a git repository. Remote
//! templates are cloned once into the data directory and refreshed on later
//! runs; a refresh that fails falls back to the cached clone.

use crate::bundler::{
    error::{Error, Result},
    utils::{Subprocess, fs, process::display_command},
};
use std::path::{Path, PathBuf};

/// Where a template comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// Directory on disk.
    Local(PathBuf),
    /// GitHub `org/repo` shorthand.
    GitHub {
        /// Organization
        org: String,
        /// Repository
        repo: String,
    },
    /// Any git URL.
    GitUrl(String),
}

impl TemplateSource {
    /// Parses a template reference, resolving relative local paths against `base_path`.
    ///
    /// An `org/repo` reference that names an existing directory under
    /// `base_path` is local.
    pub fn parse(source: &str, base_path: &Path) -> Self {
        // GitHub org/repo: contains '/', no '://', not path-like
        if source.contains('/')
            && !base_path.join(source).is_dir()
            && !source.contains("://")
            && !source.starts_with('.')
            && !source.starts_with('/')
            && !source.starts_with('~')
        {
            let parts: Vec<&str> = source.split('/').collect();
            if parts.len() == 2 && parts.iter().all(|p| !p.is_empty()) {
                return Self::GitHub {
                    org: parts[0].to_string(),
                    repo: parts[1].to_string(),
                };
            }
        }

        if source.starts_with("http://")
            || source.starts_with("https://")
            || source.starts_with("git@")
            || source.starts_with("ssh://")
        {
            return Self::GitUrl(source.to_string());
        }

        let path = PathBuf::from(source);
        if path.is_absolute() {
            Self::Local(path)
        } else {
            Self::Local(base_path.join(path))
        }
    }

    /// Whether resolving this source needs git.
    pub fn is_remote(&self) -> bool {
        !matches!(self, Self::Local(_))
    }

    /// Git URL for remote sources.
    pub fn clone_url(&self) -> Option<String> {
        match self {
            Self::Local(_) => None,
            Self::GitHub { org, repo } => Some(format!("https://github.com/{}/{}.git", org, repo)),
            Self::GitUrl(url) => Some(url.clone()),
        }
    }

    /// Directory name used for the cached clone.
    pub fn cache_name(&self) -> String {
        let tail = match self {
            Self::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Self::GitHub { repo, .. } => repo.clone(),
            Self::GitUrl(url) => url
                .trim_end_matches('/')
                .rsplit(['/', ':'])
                .next()
                .unwrap_or(url)
                .to_string(),
        };
        tail.trim_end_matches(".git").to_string()
    }

    /// Resolves the source to a directory on disk.
    ///
    /// Local templates must exist. Remote templates are cloned into
    /// `cache_root/<cache_name>` with `branch` checked out.
    pub async fn resolve(
        &self,
        branch: &str,
        cache_root: &Path,
        git: &dyn Subprocess,
    ) -> Result<PathBuf> {
        match self {
            Self::Local(path) => {
                if !path.is_dir() {
                    return Err(Error::TemplateUnsupported {
                        template: self.to_string(),
                        reason: format!("directory {} does not exist", path.display()),
                    });
                }
                Ok(path.clone())
            }
            Self::GitHub { .. } | Self::GitUrl(_) => {
                let cache = cache_root.join(self.cache_name());
                if is_cached_clone(&cache) {
                    self.refresh(&cache, branch, git).await?;
                } else {
                    self.clone_into(&cache, branch, git).await?;
                }
                Ok(cache)
            }
        }
    }

    async fn clone_into(&self, cache: &Path, branch: &str, git: &dyn Subprocess) -> Result<()> {
        let url = self.clone_url().unwrap_or_default();
        // A directory that is not a valid clone is a leftover from an
        // interrupted clone.
        fs::remove_dir_all(cache).await?;
        if let Some(parent) = cache.parent() {
            fs::create_dir_all(parent, false).await?;
        }

        log::info!("Cloning template {} ({})", url, branch);
        let args = vec![
            "clone".to_string(),
            "--branch".to_string(),
            branch.to_string(),
            url.clone(),
            cache.to_string_lossy().into_owned(),
        ];
        let output = git.run("git", &args, None).await.map_err(|e| self.network(e))?;
        if !output.success() {
            fs::remove_dir_all(cache).await?;
            return Err(Error::TemplateNetwork {
                template: self.to_string(),
                reason: format!("`{}` failed: {}", display_command("git", &args), output.stderr.trim()),
            });
        }
        Ok(())
    }

    async fn refresh(&self, cache: &Path, branch: &str, git: &dyn Subprocess) -> Result<()> {
        let fetch = vec!["fetch".to_string(), "origin".to_string()];
        match git.run("git", &fetch, Some(cache)).await {
            Ok(output) if output.success() => {}
            Ok(output) => log::warn!(
                "Unable to update template {} ({}); using cached copy",
                self,
                output.stderr.trim()
            ),
            Err(e) => log::warn!("Unable to update template {} ({}); using cached copy", self, e),
        }

        let checkout = vec![
            "checkout".to_string(),
            "--force".to_string(),
            "--detach".to_string(),
            format!("origin/{}", branch),
        ];
        let output = git.run("git", &checkout, Some(cache)).await?;
        if !output.success() {
            return Err(Error::TemplateUnsupported {
                template: self.to_string(),
                reason: format!("branch {} is not available: {}", branch, output.stderr.trim()),
            });
        }
        Ok(())
    }

    fn network(&self, error: Error) -> Error {
        Error::TemplateNetwork {
            template: self.to_string(),
            reason: error.to_string(),
        }
    }
}

impl std::fmt::Display for TemplateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::GitHub { org, repo } => write!(f, "{}/{}", org, repo),
            Self::GitUrl(url) => f.write_str(url),
        }
    }
}

/// Whether `path` holds a usable git clone.
pub fn is_cached_clone(path: &Path) -> bool {
    path.is_dir() && gix::open(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sources() {
        let base = Path::new("/project");
        assert_eq!(
            TemplateSource::parse("cyrup-ai/macos-app-template", base),
            TemplateSource::GitHub {
                org: "cyrup-ai".into(),
                repo: "macos-app-template".into()
            }
        );
        assert_eq!(
            TemplateSource::parse("./templates/app", base),
            TemplateSource::Local(PathBuf::from("/project/./templates/app"))
        );
        assert_eq!(
            TemplateSource::parse("https://example.com/t/linux-appimage-template.git", base),
            TemplateSource::GitUrl("https://example.com/t/linux-appimage-template.git".into())
        );
    }

    #[test]
    fn existing_directory_wins_over_github_shorthand() {
        let base = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(base.path().join("templates/app")).unwrap();

        assert_eq!(
            TemplateSource::parse("templates/app", base.path()),
            TemplateSource::Local(base.path().join("templates/app"))
        );
        assert!(matches!(
            TemplateSource::parse("templates/other", base.path()),
            TemplateSource::GitHub { .. }
        ));
    }

    #[test]
    fn cache_names() {
        let base = Path::new("/project");
        assert_eq!(
            TemplateSource::parse("git@example.com:t/windows-app-template.git", base).cache_name(),
            "windows-app-template"
        );
        assert_eq!(
            TemplateSource::parse("cyrup-ai/macos-app-template", base).cache_name(),
            "macos-app-template"
        );
    }
}
