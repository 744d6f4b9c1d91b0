//! Support package manager.
//!
//! A support package is a prebuilt, versioned runtime archive that the bundle
//! links against. The installed revision is recorded in the path index; an
//! install whose requested revision matches the recorded one does nothing.

use crate::bundler::{
    error::{Error, Result},
    index::{IndexKey, PathIndex},
    platform::{OutputFormat, Progress},
    settings::{AppConfig, HostEnvironment},
    utils::{ArchiveError, ArchiveFormat, Downloader, archive, checksum, fs},
};
use std::path::{Path, PathBuf};
use url::Url;

/// Default support directory when neither the index nor the layout names one.
pub const DEFAULT_SUPPORT_PATH: &str = "support";

/// Registry lookup parameters for a support package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportQuery {
    /// Platform name, e.g. `macOS`.
    pub platform: String,
    /// Runtime version tag, e.g. `3.12`.
    pub version: String,
    /// Host architecture, e.g. `arm64`.
    pub arch: String,
    /// Pinned revision, if any.
    pub revision: Option<u64>,
}

impl SupportQuery {
    /// Query parameters in registry order.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("platform", self.platform.clone()),
            ("version", self.version.clone()),
            ("arch", self.arch.clone()),
        ];
        if let Some(revision) = self.revision {
            params.push(("revision", revision.to_string()));
        }
        params
    }

    /// Registry URL for `endpoint` (`support` or `stub`) with this query.
    ///
    /// The registry is treated as a directory whether or not its path ends
    /// in `/`.
    pub fn url(&self, registry: &Url, endpoint: &str) -> Result<Url> {
        let mut registry = registry.clone();
        if !registry.path().ends_with('/') {
            let path = format!("{}/", registry.path());
            registry.set_path(&path);
        }
        let base = registry
            .join(endpoint)
            .map_err(|e| Error::Config(format!("invalid registry URL {registry}: {e}")))?;
        Url::parse_with_params(base.as_str(), self.params())
            .map_err(|e| Error::Config(format!("invalid registry URL {base}: {e}")))
    }

    /// Local file name for the downloaded archive.
    pub fn archive_name(&self, kind: &str, format: ArchiveFormat) -> String {
        let revision = self
            .revision
            .map(|r| format!("-b{r}"))
            .unwrap_or_default();
        let extension = match format {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::Zip => "zip",
        };
        format!(
            "{kind}-{}-{}-{}{revision}.{extension}",
            self.platform, self.version, self.arch
        )
    }
}

/// Builds the registry query for an app's support package.
///
/// The app must be finalized, since the version comes from the runtime tag.
pub fn resolve_query(
    app: &AppConfig,
    host: &HostEnvironment,
    format: &dyn OutputFormat,
) -> Result<SupportQuery> {
    let version = app.runtime_version_tag.clone().ok_or_else(|| {
        Error::Config(format!(
            "{} has no runtime version tag; finalize the app configuration first",
            app.app_name
        ))
    })?;
    Ok(SupportQuery {
        platform: format.platform().to_string(),
        version,
        arch: host.host_arch.clone(),
        revision: requested_revision(app, format),
    })
}

/// Revision the app asks for: its own pin, else the format default.
///
/// A custom package without a pin has no revision and is always reinstalled.
pub fn requested_revision(app: &AppConfig, format: &dyn OutputFormat) -> Option<u64> {
    match (&app.support_package, app.support_revision) {
        (_, Some(revision)) => Some(revision),
        (Some(_), None) => None,
        (None, None) => format.support_revision(),
    }
}

/// Where a support package comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageLocation {
    /// Archive on disk.
    File(PathBuf),
    /// Archive to download.
    Remote(Url),
}

impl std::fmt::Display for PackageLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// Installs support packages into bundles.
pub struct SupportPackageManager<'a> {
    downloader: &'a dyn Downloader,
    registry: &'a Url,
    download_dir: PathBuf,
    base_path: &'a Path,
}

impl<'a> SupportPackageManager<'a> {
    /// Creates a manager downloading from `registry` into `data_path/support`.
    pub fn new(
        downloader: &'a dyn Downloader,
        registry: &'a Url,
        data_path: &Path,
        base_path: &'a Path,
    ) -> Self {
        Self {
            downloader,
            registry,
            download_dir: data_path.join("support"),
            base_path,
        }
    }

    /// Locates the package for an app: its custom package, or the registry.
    pub fn locate(
        &self,
        app: &AppConfig,
        host: &HostEnvironment,
        format: &dyn OutputFormat,
    ) -> Result<(PackageLocation, String)> {
        if let Some(custom) = &app.support_package {
            return Ok(match Url::parse(custom) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {
                    let name = url
                        .path_segments()
                        .and_then(|mut s| s.next_back())
                        .filter(|s| !s.is_empty())
                        .unwrap_or("support.tar.gz")
                        .to_string();
                    (PackageLocation::Remote(url), name)
                }
                _ => {
                    let path = self.base_path.join(custom);
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    (PackageLocation::File(path), name)
                }
            });
        }

        let query = resolve_query(app, host, format)?;
        let url = query.url(self.registry, "support")?;
        Ok((
            PackageLocation::Remote(url),
            query.archive_name("support", format.support_archive_format()),
        ))
    }

    /// Installs the app's support package unless the requested revision is
    /// already in place.
    ///
    /// Makes at most one download. Any recorded revision is dropped before
    /// the old tree is removed; the index records the support path and new
    /// revision only after extraction succeeds.
    pub async fn ensure_installed(
        &self,
        app: &AppConfig,
        host: &HostEnvironment,
        format: &dyn OutputFormat,
        bundle_dir: &Path,
    ) -> Result<Progress> {
        let index = PathIndex::load_required(bundle_dir).await?;
        let requested = requested_revision(app, format);
        let installed = index.support_revision()?;
        let support_path = index.support_path()?;

        if let (Some(requested), Some(installed), Some(path)) = (requested, installed, &support_path) {
            if requested == installed && path.exists() {
                log::info!("Support package revision {} already installed; skipping", installed);
                return Ok(Progress::Skipped(format!(
                    "support revision {installed} already installed"
                )));
            }
        }

        let (location, archive_name) = self.locate(app, host, format)?;
        let archive_path = match &location {
            PackageLocation::File(path) => {
                if !path.is_file() {
                    return Err(Error::Fetch {
                        url: path.display().to_string(),
                        reason: "file does not exist".into(),
                    });
                }
                log::info!("Using support package {}", path.display());
                path.clone()
            }
            PackageLocation::Remote(url) => {
                let dest = self.download_dir.join(&archive_name);
                self.downloader.download(url, &dest).await?;
                dest
            }
        };

        if let Some(expected) = &app.support_package_sha256 {
            if !checksum::verify_sha256(&archive_path, expected).await? {
                return Err(Error::CorruptSupportPackage {
                    package: location.to_string(),
                    reason: format!("SHA-256 does not match {}", expected),
                });
            }
        }

        let relative = match index.raw_str(IndexKey::SupportPath)? {
            Some(relative) => relative.to_string(),
            None => format
                .bundle_layout(app)
                .support_path
                .unwrap_or_else(|| DEFAULT_SUPPORT_PATH.to_string()),
        };
        let target = bundle_dir.join(&relative);

        log::info!("Unpacking support package into {}", target.display());
        if installed.is_some() {
            PathIndex::update(bundle_dir, |index| {
                index.remove(IndexKey::SupportRevision);
                Ok(())
            })
            .await?;
        }
        fs::remove_dir_all(&target).await?;
        match archive::extract(&archive_path, &target).await {
            Ok(()) => {}
            Err(ArchiveError::Io(e)) => return Err(e),
            Err(e) => {
                fs::remove_dir_all(&target).await?;
                return Err(Error::CorruptSupportPackage {
                    package: location.to_string(),
                    reason: e.to_string(),
                });
            }
        }

        PathIndex::update(bundle_dir, |index| {
            index.set_path(IndexKey::SupportPath, &relative);
            match requested {
                Some(revision) => index.set_revision(IndexKey::SupportRevision, revision),
                None => {
                    index.remove(IndexKey::SupportRevision);
                }
            }
            Ok(())
        })
        .await?;

        match requested {
            Some(revision) => log::info!("✓ Installed support package revision {}", revision),
            None => log::info!("✓ Installed support package {}", location),
        }
        Ok(Progress::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_url_carries_parameters() {
        let query = SupportQuery {
            platform: "macOS".into(),
            version: "3.12".into(),
            arch: "arm64".into(),
            revision: Some(7),
        };
        let registry = Url::parse("https://registry.example.com/v1/").unwrap();
        let url = query.url(&registry, "support").unwrap();
        assert_eq!(
            url.as_str(),
            "https://registry.example.com/v1/support?platform=macOS&version=3.12&arch=arm64&revision=7"
        );
        assert_eq!(
            query.archive_name("support", ArchiveFormat::TarGz),
            "support-macOS-3.12-arm64-b7.tar.gz"
        );
    }

    #[test]
    fn registry_prefix_survives_without_trailing_slash() {
        let query = SupportQuery {
            platform: "macOS".into(),
            version: "3.12".into(),
            arch: "arm64".into(),
            revision: Some(1),
        };
        let expected =
            "https://registry.example.com/v1/stub?platform=macOS&version=3.12&arch=arm64&revision=1";
        for registry in ["https://registry.example.com/v1", "https://registry.example.com/v1/"] {
            let url = query.url(&Url::parse(registry).unwrap(), "stub").unwrap();
            assert_eq!(url.as_str(), expected, "{registry}");
        }

        let bare = Url::parse("https://registry.example.com").unwrap();
        assert_eq!(
            query.url(&bare, "support").unwrap().path(),
            "/support"
        );
    }
}
