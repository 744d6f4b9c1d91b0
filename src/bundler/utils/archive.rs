//! Archive extraction for support packages and stub binaries.

use crate::bundler::error::{Error, ErrorExt};
use flate2::read::GzDecoder;
use std::path::{Path, PathBuf};

/// Archive formats the pipeline can unpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// `.tar.gz` / `.tgz`
    TarGz,
    /// `.zip`
    Zip,
}

impl ArchiveFormat {
    /// Detects the format from a file name.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// Extraction failures, split so callers can tell a bad archive from a bad disk.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// File name does not match a supported format.
    #[error("unrecognized archive format: {}", .0.display())]
    UnknownFormat(PathBuf),

    /// The archive could not be read.
    #[error("{0}")]
    Malformed(String),

    /// Destination or scratch I/O failed.
    #[error(transparent)]
    Io(#[from] Error),
}

/// Unpacks `archive` into `dest`, creating `dest` if needed.
pub async fn extract(archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let format = ArchiveFormat::from_path(archive)
        .ok_or_else(|| ArchiveError::UnknownFormat(archive.to_path_buf()))?;

    tokio::fs::create_dir_all(dest)
        .await
        .fs_context("creating extraction directory", dest)?;

    log::debug!("Unpacking {} into {}", archive.display(), dest.display());

    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&archive).fs_context("opening archive", &archive)?;
        match format {
            ArchiveFormat::TarGz => tar::Archive::new(GzDecoder::new(file))
                .unpack(&dest)
                .map_err(|e| ArchiveError::Malformed(format!("invalid tar.gz archive: {e}"))),
            ArchiveFormat::Zip => zip::ZipArchive::new(file)
                .and_then(|mut zip| zip.extract(&dest))
                .map_err(|e| ArchiveError::Malformed(format!("invalid zip archive: {e}"))),
        }
    })
    .await
    .map_err(|e| Error::GenericError(format!("Archive extraction task panicked: {}", e)))?
}
