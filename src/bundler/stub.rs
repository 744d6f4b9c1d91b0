//! Stub binary manager.
//!
//! Formats that do not compile their launcher from source ship a prebuilt
//! "stub" executable instead. Stubs are versioned like support packages and
//! tracked by `stub_binary_revision` in the path index.

use crate::bundler::{
    error::{Error, ErrorExt, Result},
    index::{IndexKey, PathIndex},
    platform::{OutputFormat, Progress},
    settings::{AppConfig, HostEnvironment},
    support::resolve_query,
    utils::{ArchiveError, ArchiveFormat, Downloader, archive, fs},
};
use std::path::{Path, PathBuf};
use url::Url;

/// Executable file name for the host: `.exe` is appended on Windows only.
pub fn executable_name(name: &str, host: &HostEnvironment) -> String {
    if host.is_windows() && !name.to_ascii_lowercase().ends_with(".exe") {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

/// Revision the app asks for: its own pin, else the format default.
pub fn requested_revision(app: &AppConfig, format: &dyn OutputFormat) -> Option<u64> {
    app.stub_binary_revision.or_else(|| format.stub_binary_revision())
}

/// Installs stub binaries into bundles.
pub struct StubBinaryManager<'a> {
    downloader: &'a dyn Downloader,
    registry: &'a Url,
    download_dir: PathBuf,
}

impl<'a> StubBinaryManager<'a> {
    /// Creates a manager downloading from `registry` into `data_path/stub`.
    pub fn new(downloader: &'a dyn Downloader, registry: &'a Url, data_path: &Path) -> Self {
        Self {
            downloader,
            registry,
            download_dir: data_path.join("stub"),
        }
    }

    /// Installs the stub at the format's binary path unless the requested
    /// revision is already there.
    pub async fn ensure_installed(
        &self,
        app: &AppConfig,
        host: &HostEnvironment,
        format: &dyn OutputFormat,
        bundle_dir: &Path,
    ) -> Result<Progress> {
        let index = PathIndex::load_required(bundle_dir).await?;
        let requested = requested_revision(app, format);
        let binary_path = format.binary_path(app, bundle_dir, host);

        let recorded = index.stub_binary_revision()?;
        if let (Some(requested), Some(installed)) = (requested, recorded) {
            if requested == installed && binary_path.exists() {
                log::info!("Stub binary revision {} already installed; skipping", installed);
                return Ok(Progress::Skipped(format!(
                    "stub binary revision {installed} already installed"
                )));
            }
        }

        let mut query = resolve_query(app, host, format)?;
        query.revision = requested;
        let url = query.url(self.registry, "stub")?;
        let archive_path = self
            .download_dir
            .join(query.archive_name("stub", ArchiveFormat::Zip));
        self.downloader.download(&url, &archive_path).await?;

        let scratch = self
            .download_dir
            .join(format!("unpack-{}", uuid::Uuid::new_v4()));
        let installed = match self
            .unpack_stub(&url, &archive_path, &scratch, &format.stub_name(app, host))
            .await
        {
            Ok(stub) => replace_binary(bundle_dir, recorded.is_some(), &stub, &binary_path).await,
            Err(e) => Err(e),
        };
        fs::remove_dir_all(&scratch).await?;
        installed?;

        PathIndex::update(bundle_dir, |index| {
            match requested {
                Some(revision) => index.set_revision(IndexKey::StubBinaryRevision, revision),
                None => {
                    index.remove(IndexKey::StubBinaryRevision);
                }
            }
            Ok(())
        })
        .await?;

        log::info!("✓ Installed stub binary {}", binary_path.display());
        Ok(Progress::Done)
    }

    /// Extracts the archive into `scratch` and returns the validated stub.
    async fn unpack_stub(
        &self,
        url: &Url,
        archive_path: &Path,
        scratch: &Path,
        stub_name: &str,
    ) -> Result<PathBuf> {
        let corrupt = |reason: String| Error::CorruptStubBinary {
            package: url.to_string(),
            reason,
        };

        match archive::extract(archive_path, scratch).await {
            Ok(()) => {}
            Err(ArchiveError::Io(e)) => return Err(e),
            Err(e) => return Err(corrupt(e.to_string())),
        }

        let stub = find_file(scratch, stub_name)?
            .ok_or_else(|| corrupt(format!("archive does not contain {stub_name}")))?;

        let bytes = tokio::fs::read(&stub)
            .await
            .fs_context("reading stub binary", &stub)?;
        match goblin::Object::parse(&bytes) {
            Ok(goblin::Object::Unknown(magic)) => {
                return Err(corrupt(format!("{stub_name} is not an executable (magic {magic:#x})")));
            }
            Ok(_) => {}
            Err(e) => return Err(corrupt(format!("{stub_name} is not an executable: {e}"))),
        }
        Ok(stub)
    }
}

/// Puts `stub` at `binary_path`.
///
/// A recorded revision is dropped first so an interrupted copy is never
/// taken for an installed binary.
async fn replace_binary(
    bundle_dir: &Path,
    has_revision: bool,
    stub: &Path,
    binary_path: &Path,
) -> Result<()> {
    if has_revision {
        PathIndex::update(bundle_dir, |index| {
            index.remove(IndexKey::StubBinaryRevision);
            Ok(())
        })
        .await?;
    }
    if let Some(parent) = binary_path.parent() {
        fs::create_dir_all(parent, false).await?;
    }
    fs::remove_path(binary_path).await?;
    fs::copy_file(stub, binary_path).await?;
    fs::make_executable(binary_path).await
}

fn find_file(root: &Path, name: &str) -> Result<Option<PathBuf>> {
    for entry in walkdir::WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_file() && entry.file_name().to_string_lossy() == name {
            return Ok(Some(entry.into_path()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_only_on_windows() {
        let windows = HostEnvironment::new("Windows", "x86_64", ["Windows"]);
        let mac = HostEnvironment::new("Darwin", "arm64", ["Darwin"]);
        assert_eq!(executable_name("GUI-Stub", &windows), "GUI-Stub.exe");
        assert_eq!(executable_name("First App.exe", &windows), "First App.exe");
        assert_eq!(executable_name("GUI-Stub", &mac), "GUI-Stub");
    }
}
