//! SHA-256 checksums.
//!
//! Used to verify downloaded support packages against a pinned digest and to
//! fingerprint finished bundle trees in the run summary.

use crate::{bail, bundler::error::ErrorExt, bundler::Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Calculates the SHA-256 of a file, or of a directory tree.
///
/// Directory digests cover each file's relative path and content, visited in
/// sorted order, so the same tree always hashes the same.
///
/// # Returns
///
/// Hex-encoded SHA-256 hash (64 characters)
pub async fn calculate_sha256(path: &Path) -> Result<String> {
    let metadata = tokio::fs::metadata(path)
        .await
        .fs_context("reading metadata for", path)?;

    if metadata.is_file() {
        let mut hasher = Sha256::new();
        hash_file(path, &mut hasher).await?;
        Ok(hex::encode(hasher.finalize()))
    } else if metadata.is_dir() {
        calculate_directory_sha256(path).await
    } else {
        bail!("Path is neither file nor directory: {}", path.display())
    }
}

/// Compares a file's SHA-256 against an expected hex digest (case-insensitive).
pub async fn verify_sha256(path: &Path, expected: &str) -> Result<bool> {
    let actual = calculate_sha256(path).await?;
    Ok(actual.eq_ignore_ascii_case(expected.trim()))
}

async fn hash_file(path: &Path, hasher: &mut Sha256) -> Result<()> {
    let mut file = tokio::fs::File::open(path)
        .await
        .fs_context("opening file for hashing", path)?;
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file
            .read(&mut buffer)
            .await
            .fs_context("reading file for hash calculation", path)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(())
}

async fn calculate_directory_sha256(dir_path: &Path) -> Result<String> {
    let mut entries: Vec<_> = walkdir::WalkDir::new(dir_path)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .collect();

    // Sort by path for deterministic ordering
    entries.sort_by_key(|e| e.path().to_path_buf());

    let mut hasher = Sha256::new();
    for entry in entries {
        if let Ok(rel_path) = entry.path().strip_prefix(dir_path) {
            hasher.update(rel_path.to_string_lossy().as_bytes());
        }
        hash_file(entry.path(), &mut hasher).await?;
    }

    Ok(hex::encode(hasher.finalize()))
}
